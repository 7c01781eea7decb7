//! The collaborator interface the ledger reads its records from.

use std::sync::Arc;

use crate::{
    BalanceMap, Expense, GroupState, LedgerError, MemberId, Money, RenameRecord, ResultLedger,
    Settlement, compute_balances,
};

/// Members, active expenses and active settlements of one group, read at one
/// point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub members: Vec<MemberId>,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
}

/// Counts and sums of the active records of a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupTotals {
    pub expense_count: usize,
    pub settlement_count: usize,
    pub total_expenses: Money,
    pub total_settled: Money,
}

impl LedgerSnapshot {
    pub fn balances(&self) -> ResultLedger<BalanceMap> {
        compute_balances(&self.members, &self.expenses, &self.settlements)
    }

    pub fn totals(&self) -> ResultLedger<GroupTotals> {
        let too_large = || LedgerError::InvalidAmount("group total is out of range".to_string());
        Ok(GroupTotals {
            expense_count: self.expenses.len(),
            settlement_count: self.settlements.len(),
            total_expenses: Money::checked_sum(self.expenses.iter().map(|e| e.amount))
                .ok_or_else(too_large)?,
            total_settled: Money::checked_sum(self.settlements.iter().map(|s| s.amount))
                .ok_or_else(too_large)?,
        })
    }
}

/// Everything the timeline is synthesized from: the group, every expense and
/// settlement including soft-deleted ones, and the rename audit trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationLog {
    pub group: GroupState,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
    pub renames: Vec<RenameRecord>,
}

/// Source of group records.
///
/// Balances and transfers assume their inputs describe a single point in time.
/// The provided [`fetch_snapshot`](LedgerSource::fetch_snapshot) reads the
/// three collections one after the other; implementors that can read them
/// together should override it.
pub trait LedgerSource {
    fn fetch_active_members(&self, group_id: &str) -> ResultLedger<Vec<MemberId>>;

    fn fetch_active_expenses(&self, group_id: &str) -> ResultLedger<Vec<Expense>>;

    fn fetch_active_settlements(&self, group_id: &str) -> ResultLedger<Vec<Settlement>>;

    fn fetch_mutation_log(&self, group_id: &str) -> ResultLedger<MutationLog>;

    fn fetch_snapshot(&self, group_id: &str) -> ResultLedger<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            members: self.fetch_active_members(group_id)?,
            expenses: self.fetch_active_expenses(group_id)?,
            settlements: self.fetch_active_settlements(group_id)?,
        })
    }
}

impl<T: LedgerSource + ?Sized> LedgerSource for Arc<T> {
    fn fetch_active_members(&self, group_id: &str) -> ResultLedger<Vec<MemberId>> {
        (**self).fetch_active_members(group_id)
    }

    fn fetch_active_expenses(&self, group_id: &str) -> ResultLedger<Vec<Expense>> {
        (**self).fetch_active_expenses(group_id)
    }

    fn fetch_active_settlements(&self, group_id: &str) -> ResultLedger<Vec<Settlement>> {
        (**self).fetch_active_settlements(group_id)
    }

    fn fetch_mutation_log(&self, group_id: &str) -> ResultLedger<MutationLog> {
        (**self).fetch_mutation_log(group_id)
    }

    fn fetch_snapshot(&self, group_id: &str) -> ResultLedger<LedgerSnapshot> {
        (**self).fetch_snapshot(group_id)
    }
}
