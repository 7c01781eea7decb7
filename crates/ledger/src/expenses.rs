//! Expenses and their per-participant splits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    LedgerError, MemberId, Money, ResultLedger,
    util::{active_by_default, lenient_instant},
};

/// The portion of an expense attributed to one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    #[serde(alias = "userId")]
    pub member_id: MemberId,
    pub share: Money,
}

impl Split {
    pub fn new(member_id: impl Into<MemberId>, share: Money) -> Self {
        Self {
            member_id: member_id.into(),
            share,
        }
    }
}

/// A recorded expense.
///
/// `payer_id` paid `amount`, and each split owes its `share` of it. Only
/// `active` expenses take part in balances; soft-deleted ones are kept for the
/// timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    #[serde(alias = "paidByUserId")]
    pub payer_id: MemberId,
    #[serde(default)]
    pub title: String,
    pub amount: Money,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default, alias = "createdByUserId")]
    pub created_by: Option<MemberId>,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "deletedByUserId")]
    pub deleted_by: Option<MemberId>,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub restored_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "restoredByUserId")]
    pub restored_by: Option<MemberId>,
}

impl Expense {
    pub fn new(
        id: impl Into<String>,
        payer_id: impl Into<MemberId>,
        title: impl Into<String>,
        amount: Money,
        splits: Vec<Split>,
    ) -> Self {
        Self {
            id: id.into(),
            payer_id: payer_id.into(),
            title: title.into(),
            amount,
            splits,
            active: true,
            created_by: None,
            created_at: None,
            deleted_at: None,
            deleted_by: None,
            restored_at: None,
            restored_by: None,
        }
    }

    /// The payer and whoever recorded the expense may delete or restore it.
    pub fn is_authored_by(&self, member_id: &str) -> bool {
        self.payer_id == member_id || self.created_by.as_deref() == Some(member_id)
    }

    /// Sum of all split shares, or `None` when it does not fit in cents.
    pub fn split_total(&self) -> Option<Money> {
        Money::checked_sum(self.splits.iter().map(|s| s.share))
    }

    /// Checks the creation-time invariants: positive amount, non-negative
    /// shares, shares summing exactly to the amount.
    pub fn validate(&self) -> ResultLedger<()> {
        if !self.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        if self.splits.is_empty() {
            return Err(LedgerError::InvalidSplit(
                "expense needs at least one participant".to_string(),
            ));
        }
        if let Some(split) = self.splits.iter().find(|s| s.share.is_negative()) {
            return Err(LedgerError::InvalidSplit(format!(
                "share of {} must not be negative",
                split.member_id
            )));
        }
        let total = self
            .split_total()
            .ok_or_else(|| LedgerError::InvalidAmount("shares are too large".to_string()))?;
        if total != self.amount {
            return Err(LedgerError::InvalidSplit(format!(
                "shares sum to {total}, expected {}",
                self.amount
            )));
        }
        Ok(())
    }
}
