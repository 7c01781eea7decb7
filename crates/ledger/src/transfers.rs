//! Suggested transfers that close out a balance map.

use serde::{Deserialize, Serialize};

use crate::{BalanceMap, MemberId, Money};

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(rename = "fromUserId")]
    pub from_id: MemberId,
    #[serde(rename = "toUserId")]
    pub to_id: MemberId,
    pub amount: Money,
}

/// Greedily matches debtors with creditors.
///
/// Creditors (positive balance) and debtors (negative balance, tracked as the
/// positive amount owed) are each sorted by amount, largest first. The sort is
/// stable, so equal amounts keep the roster order of `balances`. The largest
/// remaining debtor then pays the largest remaining creditor
/// `min(owed, claim)`, and whichever side reaches zero advances (both may
/// advance in the same step).
///
/// The result is minimal for this two-list matching, not necessarily the
/// global minimum number of transfers for every debt topology.
pub fn plan_transfers(balances: &BalanceMap) -> Vec<Transfer> {
    let mut creditors: Vec<(&str, Money)> = balances
        .iter()
        .filter(|(_, amount)| amount.is_positive())
        .collect();
    let mut debtors: Vec<(&str, Money)> = balances
        .iter()
        .filter(|(_, amount)| amount.is_negative())
        .map(|(member, amount)| (member, -amount))
        .collect();

    creditors.sort_by(|a, b| b.1.cmp(&a.1));
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < debtors.len() && j < creditors.len() {
        let (debtor, owed) = debtors[i];
        let (creditor, claim) = creditors[j];

        let pay = owed.min(claim);
        if pay.is_positive() {
            transfers.push(Transfer {
                from_id: debtor.to_string(),
                to_id: creditor.to_string(),
                amount: pay,
            });
            debtors[i].1 -= pay;
            creditors[j].1 -= pay;
        }

        if !debtors[i].1.is_positive() {
            i += 1;
        }
        if !creditors[j].1.is_positive() {
            j += 1;
        }
    }

    transfers
}
