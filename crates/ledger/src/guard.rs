//! Capping new settlements at the amount currently owed.

use crate::{BalanceMap, LedgerError, MemberId, Money, ResultLedger, plan_transfers};

/// An accepted settlement request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementAuthorization {
    pub from_id: MemberId,
    pub to_id: MemberId,
    /// The amount to record, exactly as requested.
    pub amount: Money,
    /// The suggested transfer the request was checked against.
    pub owed: Money,
}

/// Checks a proposed settlement against the current suggested transfers.
///
/// Only a direct `from_id -> to_id` transfer counts: there is no reverse
/// lookup and no settling along a chain of debts, even when the chain would be
/// economically equivalent. The requested amount is never clamped; anything
/// above the owed amount is rejected with the owed amount as the cap.
pub fn authorize_settlement(
    balances: &BalanceMap,
    from_id: &str,
    to_id: &str,
    amount: Money,
) -> ResultLedger<SettlementAuthorization> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(
            "settlement amount must be > 0".to_string(),
        ));
    }

    let owed = plan_transfers(balances)
        .into_iter()
        .find(|t| t.from_id == from_id && t.to_id == to_id)
        .map(|t| t.amount);

    let Some(owed) = owed else {
        tracing::debug!("rejected settlement {from_id} -> {to_id}: nothing owed");
        return Err(LedgerError::NothingOwed {
            from: from_id.to_string(),
            to: to_id.to_string(),
        });
    };

    if amount > owed {
        tracing::debug!("rejected settlement {from_id} -> {to_id}: {amount} exceeds {owed}");
        return Err(LedgerError::ExceedsOwed {
            requested: amount,
            max_allowed: owed,
        });
    }

    Ok(SettlementAuthorization {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        amount,
        owed,
    })
}
