//! Settlements: recorded payments between two members.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    MemberId, Money,
    util::{active_by_default, lenient_instant},
};

/// `from_id` paid `to_id` the given `amount`.
///
/// A settlement reduces what `from_id` owes and what `to_id` is owed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: String,
    #[serde(alias = "fromUserId")]
    pub from_id: MemberId,
    #[serde(alias = "toUserId")]
    pub to_id: MemberId,
    pub amount: Money,
    #[serde(default)]
    pub note: String,
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

impl Settlement {
    pub fn new(
        id: impl Into<String>,
        from_id: impl Into<MemberId>,
        to_id: impl Into<MemberId>,
        amount: Money,
    ) -> Self {
        Self {
            id: id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount,
            note: String::new(),
            active: true,
            created_by: None,
            created_at: None,
            deleted_at: None,
            deleted_by: None,
            restored_at: None,
            restored_by: None,
        }
    }

    /// When the settlement last changed status: its deletion while it is
    /// deleted, its creation otherwise.
    pub fn status_at(&self) -> Option<DateTime<Utc>> {
        if self.active {
            self.created_at
        } else {
            self.deleted_at.or(self.created_at)
        }
    }

    /// Whoever recorded the settlement may delete or restore it.
    pub fn is_authored_by(&self, member_id: &str) -> bool {
        self.created_by.as_deref() == Some(member_id)
    }
}
