//! Folding expenses and settlements into per-member balances.

use std::collections::HashMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{Expense, LedgerError, MemberId, Money, ResultLedger, Settlement};

/// Net balance of every member of a group.
///
/// Positive values mean the member is owed money, negative values mean the
/// member owes money. Iteration follows the roster order the map was built
/// from; members that only show up in records are appended in first-seen
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceMap {
    order: Vec<MemberId>,
    amounts: HashMap<MemberId, Money>,
}

impl BalanceMap {
    /// Creates a map with every member at zero. Duplicated ids are ignored.
    pub fn new<I, M>(members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MemberId>,
    {
        let mut map = Self::default();
        for member in members {
            let member = member.into();
            if !map.amounts.contains_key(&member) {
                map.amounts.insert(member.clone(), Money::ZERO);
                map.order.push(member);
            }
        }
        map
    }

    pub fn get(&self, member_id: &str) -> Option<Money> {
        self.amounts.get(member_id).copied()
    }

    /// Members in roster order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(member, balance)` pairs in roster order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Money)> {
        self.order
            .iter()
            .map(|m| (m.as_str(), self.amounts.get(m).copied().unwrap_or_default()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all balances; zero whenever shares add up to their expenses.
    pub fn total(&self) -> Money {
        let total: i128 = self.amounts.values().map(|m| i128::from(m.cents())).sum();
        Money::new(i64::try_from(total).unwrap_or(if total < 0 { i64::MIN } else { i64::MAX }))
    }

    /// Adds `amount` to a member's balance.
    ///
    /// Fails with [`LedgerError::InvalidAmount`] when the balance would leave
    /// the range of exactly representable decimal amounts; the map is left
    /// unchanged in that case.
    pub fn credit(&mut self, member_id: &str, amount: Money) -> ResultLedger<()> {
        let entry = self.entry_mut(member_id);
        *entry = entry
            .checked_add(amount)
            .filter(|m| m.is_representable())
            .ok_or_else(|| out_of_range(member_id))?;
        Ok(())
    }

    pub fn debit(&mut self, member_id: &str, amount: Money) -> ResultLedger<()> {
        let entry = self.entry_mut(member_id);
        *entry = entry
            .checked_sub(amount)
            .filter(|m| m.is_representable())
            .ok_or_else(|| out_of_range(member_id))?;
        Ok(())
    }

    /// Applies a payment of `amount` from `from_id` to `to_id`.
    pub fn apply_settlement(
        &mut self,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> ResultLedger<()> {
        self.credit(from_id, amount)?;
        self.debit(to_id, amount)
    }

    fn entry_mut(&mut self, member_id: &str) -> &mut Money {
        if !self.amounts.contains_key(member_id) {
            tracing::warn!("balance update for {member_id:?}, who is not in the roster");
            self.order.push(member_id.to_string());
        }
        self.amounts.entry(member_id.to_string()).or_default()
    }
}

fn out_of_range(member_id: &str) -> LedgerError {
    LedgerError::InvalidAmount(format!("balance of {member_id} is out of range"))
}

impl Serialize for BalanceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (member, amount) in self.iter() {
            map.serialize_entry(member, &amount)?;
        }
        map.end()
    }
}

/// Computes the balance of every member.
///
/// - every roster member starts at zero and is always present in the result;
/// - an active expense credits its amount to the payer and debits each share
///   from its participant;
/// - an active settlement credits the payer and debits the receiver.
///
/// Amounts are integer cents, so each accumulation step is already rounded
/// to the cent. Inactive (soft-deleted) records are skipped. Participants
/// outside the roster are not rejected here: membership is validated when
/// records are written.
///
/// A balance that would no longer fit a decimal amount is reported as
/// [`LedgerError::InvalidAmount`] instead of wrapping.
pub fn compute_balances(
    members: &[MemberId],
    expenses: &[Expense],
    settlements: &[Settlement],
) -> ResultLedger<BalanceMap> {
    let mut balances = BalanceMap::new(members.iter().cloned());

    for expense in expenses.iter().filter(|e| e.active) {
        balances.credit(&expense.payer_id, expense.amount)?;
        for split in &expense.splits {
            balances.debit(&split.member_id, split.share)?;
        }
    }

    for settlement in settlements.iter().filter(|s| s.active) {
        balances.apply_settlement(&settlement.from_id, &settlement.to_id, settlement.amount)?;
    }

    Ok(balances)
}
