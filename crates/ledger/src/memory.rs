//! In-memory group store.
//!
//! [`MemoryStore`] plays the storage collaborator: it owns groups, members,
//! expenses, settlements and the rename audit trail, enforces the write rules
//! around them (membership, exact splits, closed groups) and serves the
//! [`LedgerSource`] reads. All state sits behind one `RwLock`, so every read
//! is a consistent snapshot and every write is serialized.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::{
    BalanceMap, Expense, GroupState, LedgerError, LedgerSnapshot, LedgerSource, MemberId, Money,
    MutationLog, RenameRecord, ResultLedger, Settlement, Split, authorize_settlement,
    compute_balances, plan_transfers, util::to_millis,
};

/// Note given to settlements recorded by [`MemoryStore::settle_all`] when the
/// caller leaves it out.
pub const SETTLE_ALL_NOTE: &str = "Settle all";

/// Request to record a new expense.
#[derive(Clone, Debug)]
pub struct NewExpense {
    pub title: String,
    pub amount: Money,
    /// Defaults to the acting member.
    pub payer_id: Option<MemberId>,
    /// Defaults to an even split over the whole roster.
    pub splits: Option<Vec<Split>>,
}

/// Request to record a payment between two members.
#[derive(Clone, Debug)]
pub struct NewSettlement {
    pub from_id: MemberId,
    pub to_id: MemberId,
    pub amount: Money,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    groups: HashMap<String, GroupRecord>,
    last_stamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
struct GroupRecord {
    state: GroupState,
    expenses: Vec<Expense>,
    settlements: Vec<Settlement>,
    renames: Vec<RenameRecord>,
}

impl GroupRecord {
    fn ensure_open(&self) -> ResultLedger<()> {
        if self.state.closed {
            return Err(LedgerError::GroupClosed(self.state.id.clone()));
        }
        Ok(())
    }

    fn ensure_active(&self) -> ResultLedger<()> {
        if self.state.deleted {
            return Err(LedgerError::GroupDeleted(self.state.id.clone()));
        }
        Ok(())
    }

    fn ensure_member(&self, member_id: &str) -> ResultLedger<()> {
        if !self.state.is_member(member_id) {
            return Err(LedgerError::NotMember(member_id.to_string()));
        }
        Ok(())
    }

    /// An acting member, when one is given, must belong to the group.
    fn ensure_actor(&self, actor_id: Option<&str>) -> ResultLedger<()> {
        match actor_id {
            Some(actor) if !self.state.is_member(actor) => Err(LedgerError::Forbidden(format!(
                "{actor} is not a member of the group"
            ))),
            _ => Ok(()),
        }
    }

    fn ensure_owner(&self, actor_id: Option<&str>, action: &str) -> ResultLedger<()> {
        if actor_id.is_some_and(|actor| self.state.is_owner(actor)) {
            return Ok(());
        }
        Err(LedgerError::Forbidden(format!(
            "only the group owner can {action} the group"
        )))
    }

    fn ensure_writable(&self, actor_id: Option<&str>) -> ResultLedger<()> {
        self.ensure_actor(actor_id)?;
        self.ensure_active()?;
        self.ensure_open()
    }

    /// Reads of a deleted group are reserved to its owner, and only when
    /// deleted data was asked for.
    fn ensure_visible(&self, actor_id: Option<&str>, include_deleted: bool) -> ResultLedger<()> {
        self.ensure_actor(actor_id)?;
        let owner = actor_id.is_some_and(|actor| self.state.is_owner(actor));
        if self.state.deleted && !(include_deleted && owner) {
            return Err(LedgerError::GroupDeleted(self.state.id.clone()));
        }
        Ok(())
    }

    fn balances(&self) -> ResultLedger<BalanceMap> {
        compute_balances(&self.state.member_ids, &self.expenses, &self.settlements)
    }
}

impl StoreInner {
    /// Strictly increasing, millisecond precision mutation clock.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = to_millis(Utc::now());
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn group(&self, group_id: &str) -> ResultLedger<&GroupRecord> {
        self.groups
            .get(group_id)
            .ok_or_else(|| LedgerError::KeyNotFound(format!("group {group_id}")))
    }

    fn group_mut(&mut self, group_id: &str) -> ResultLedger<&mut GroupRecord> {
        self.groups
            .get_mut(group_id)
            .ok_or_else(|| LedgerError::KeyNotFound(format!("group {group_id}")))
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidName(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Newest first, by creation stamp.
fn newest_first<T, F>(mut records: Vec<T>, stamp: F) -> Vec<T>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    records.sort_by(|a, b| stamp(b).cmp(&stamp(a)));
    records
}

/// Generates the soft-delete and restore methods for a record collection.
///
/// Only the group owner and the record's author may toggle a record. A
/// restore that would push a balance out of range is undone.
macro_rules! impl_soft_delete {
    ($delete_fn:ident, $restore_fn:ident, $field:ident, $label:literal) => {
        #[doc = concat!("Soft-deletes a ", $label, ". Deleting it again is a no-op.")]
        pub fn $delete_fn(
            &self,
            group_id: &str,
            record_id: &str,
            actor_id: Option<&str>,
        ) -> ResultLedger<()> {
            let mut inner = self.write()?;
            let at = inner.tick();
            let group = inner.group_mut(group_id)?;
            group.ensure_writable(actor_id)?;
            let owner = actor_id.is_some_and(|actor| group.state.is_owner(actor));
            let record = group
                .$field
                .iter_mut()
                .find(|r| r.id == record_id)
                .ok_or_else(|| LedgerError::KeyNotFound(format!(concat!($label, " {}"), record_id)))?;
            if !owner && !actor_id.is_some_and(|actor| record.is_authored_by(actor)) {
                return Err(LedgerError::Forbidden(
                    concat!("only the group owner or the author can delete this ", $label).to_string(),
                ));
            }
            if record.active {
                record.active = false;
                record.deleted_at = Some(at);
                record.deleted_by = actor_id.map(ToString::to_string);
            }
            Ok(())
        }

        #[doc = concat!("Restores a soft-deleted ", $label, ". Restoring an active one is a no-op.")]
        pub fn $restore_fn(
            &self,
            group_id: &str,
            record_id: &str,
            actor_id: Option<&str>,
        ) -> ResultLedger<()> {
            let mut inner = self.write()?;
            let at = inner.tick();
            let group = inner.group_mut(group_id)?;
            group.ensure_writable(actor_id)?;
            let owner = actor_id.is_some_and(|actor| group.state.is_owner(actor));
            let index = group
                .$field
                .iter()
                .position(|r| r.id == record_id)
                .ok_or_else(|| LedgerError::KeyNotFound(format!(concat!($label, " {}"), record_id)))?;
            if !owner && !actor_id.is_some_and(|actor| group.$field[index].is_authored_by(actor)) {
                return Err(LedgerError::Forbidden(
                    concat!("only the group owner or the author can restore this ", $label).to_string(),
                ));
            }
            if !group.$field[index].active {
                group.$field[index].active = true;
                if let Err(err) = group.balances() {
                    group.$field[index].active = false;
                    return Err(err);
                }
                let record = &mut group.$field[index];
                record.restored_at = Some(at);
                record.restored_by = actor_id.map(ToString::to_string);
            }
            Ok(())
        }
    };
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ResultLedger<RwLockReadGuard<'_, StoreInner>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> ResultLedger<RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Storage("store lock poisoned".to_string()))
    }

    /// Creates a group and returns its id.
    ///
    /// The roster starts with the owner, followed by `members` in order;
    /// duplicates are dropped.
    pub fn create_group(
        &self,
        name: &str,
        owner_id: &str,
        members: &[MemberId],
    ) -> ResultLedger<String> {
        let name = normalize_required_name(name, "group name")?;
        let owner_id = normalize_required_name(owner_id, "owner id")?;

        let mut state = GroupState::new(Uuid::new_v4().to_string(), name, owner_id);
        for member in members {
            let member = normalize_required_name(member, "member id")?;
            if !state.is_member(&member) {
                state.member_ids.push(member);
            }
        }

        let id = state.id.clone();
        let mut inner = self.write()?;
        state.created_at = Some(inner.tick());
        inner.groups.insert(
            id.clone(),
            GroupRecord {
                state,
                expenses: Vec::new(),
                settlements: Vec::new(),
                renames: Vec::new(),
            },
        );
        tracing::debug!("created group {id}");
        Ok(id)
    }

    /// Current state of a group, whatever its status.
    pub fn group(&self, group_id: &str) -> ResultLedger<GroupState> {
        Ok(self.read()?.group(group_id)?.state.clone())
    }

    /// Current state of a group as `actor_id` may see it.
    ///
    /// A deleted group is only shown to its owner, and only with
    /// `include_deleted`; everyone else gets [`LedgerError::GroupDeleted`].
    pub fn visible_group(
        &self,
        group_id: &str,
        actor_id: Option<&str>,
        include_deleted: bool,
    ) -> ResultLedger<GroupState> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        group.ensure_visible(actor_id, include_deleted)?;
        Ok(group.state.clone())
    }

    /// Groups `actor_id` belongs to (every group without an actor), newest
    /// first.
    pub fn list_groups(
        &self,
        actor_id: Option<&str>,
        include_deleted: bool,
    ) -> ResultLedger<Vec<GroupState>> {
        let inner = self.read()?;
        let groups = inner
            .groups
            .values()
            .filter(|g| g.ensure_visible(actor_id, include_deleted).is_ok())
            .map(|g| g.state.clone())
            .collect();
        Ok(newest_first(groups, |g| g.created_at))
    }

    /// Expenses of a group, newest first. Soft-deleted ones are only listed
    /// with `include_deleted`.
    pub fn list_expenses(
        &self,
        group_id: &str,
        actor_id: Option<&str>,
        include_deleted: bool,
    ) -> ResultLedger<Vec<Expense>> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        group.ensure_visible(actor_id, include_deleted)?;
        let expenses = group
            .expenses
            .iter()
            .filter(|e| include_deleted || e.active)
            .cloned()
            .collect();
        Ok(newest_first(expenses, |e| e.created_at))
    }

    /// Settlements of a group, newest first. Soft-deleted ones are only
    /// listed with `include_deleted`.
    pub fn list_settlements(
        &self,
        group_id: &str,
        actor_id: Option<&str>,
        include_deleted: bool,
    ) -> ResultLedger<Vec<Settlement>> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        group.ensure_visible(actor_id, include_deleted)?;
        let settlements = group
            .settlements
            .iter()
            .filter(|s| include_deleted || s.active)
            .cloned()
            .collect();
        Ok(newest_first(settlements, |s| s.created_at))
    }

    /// Every settlement of a group, deleted ones included, ordered by their
    /// latest status change (see [`Settlement::status_at`]), newest first.
    pub fn settlement_history(
        &self,
        group_id: &str,
        actor_id: Option<&str>,
        include_deleted: bool,
    ) -> ResultLedger<Vec<Settlement>> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        group.ensure_visible(actor_id, include_deleted)?;
        Ok(newest_first(group.settlements.clone(), Settlement::status_at))
    }

    /// Adds a member at the end of the roster. Adding an existing member is a
    /// no-op.
    pub fn add_member(
        &self,
        group_id: &str,
        member_id: &str,
        actor_id: Option<&str>,
    ) -> ResultLedger<()> {
        let member_id = normalize_required_name(member_id, "member id")?;
        let mut inner = self.write()?;
        let group = inner.group_mut(group_id)?;
        group.ensure_writable(actor_id)?;
        if !group.state.is_member(&member_id) {
            group.state.member_ids.push(member_id);
        }
        Ok(())
    }

    /// Renames the group and appends the change to the audit trail.
    pub fn rename_group(
        &self,
        group_id: &str,
        name: &str,
        actor_id: Option<&str>,
    ) -> ResultLedger<()> {
        let name = normalize_required_name(name, "group name")?;
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_writable(actor_id)?;
        if group.state.name == name {
            return Ok(());
        }

        let before = std::mem::replace(&mut group.state.name, name.clone());
        group.renames.push(RenameRecord {
            id: Uuid::new_v4().to_string(),
            at: Some(at),
            actor_id: actor_id.map(ToString::to_string),
            before,
            after: name,
        });
        Ok(())
    }

    /// Closes the group, blocking every write until it is reopened. Owner
    /// only.
    pub fn close_group(&self, group_id: &str, actor_id: Option<&str>) -> ResultLedger<()> {
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_owner(actor_id, "close")?;
        group.ensure_active()?;
        if !group.state.closed {
            group.state.closed = true;
            group.state.closed_at = Some(at);
            group.state.closed_by = actor_id.map(ToString::to_string);
        }
        Ok(())
    }

    /// Owner only.
    pub fn reopen_group(&self, group_id: &str, actor_id: Option<&str>) -> ResultLedger<()> {
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_owner(actor_id, "reopen")?;
        group.ensure_active()?;
        if group.state.closed {
            group.state.closed = false;
            group.state.reopened_at = Some(at);
            group.state.reopened_by = actor_id.map(ToString::to_string);
        }
        Ok(())
    }

    /// Soft-deletes the group. Owner only; deleting it again is a no-op.
    ///
    /// Records are kept, but reads and writes fail with
    /// [`LedgerError::GroupDeleted`] until the owner restores it.
    pub fn delete_group(&self, group_id: &str, actor_id: Option<&str>) -> ResultLedger<()> {
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_owner(actor_id, "delete")?;
        if !group.state.deleted {
            group.state.deleted = true;
            group.state.deleted_at = Some(at);
            group.state.deleted_by = actor_id.map(ToString::to_string);
            tracing::debug!("deleted group {group_id}");
        }
        Ok(())
    }

    /// Owner only. Restoring an active group is a no-op.
    pub fn restore_group(&self, group_id: &str, actor_id: Option<&str>) -> ResultLedger<()> {
        let mut inner = self.write()?;
        let group = inner.group_mut(group_id)?;
        group.ensure_owner(actor_id, "restore")?;
        group.state.deleted = false;
        Ok(())
    }

    /// Records an expense and returns its id.
    ///
    /// Payer and participants must be members, the shares must add up to
    /// the amount exactly, and no balance may leave the representable range
    /// once the expense is counted.
    pub fn add_expense(
        &self,
        group_id: &str,
        new: NewExpense,
        actor_id: Option<&str>,
    ) -> ResultLedger<String> {
        let title = normalize_required_name(&new.title, "expense title")?;
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_writable(actor_id)?;

        let payer_id = new
            .payer_id
            .or_else(|| actor_id.map(ToString::to_string))
            .ok_or_else(|| LedgerError::InvalidSplit("payer is required".to_string()))?;
        group.ensure_member(&payer_id)?;

        let splits = match new.splits {
            Some(splits) => splits,
            None => new
                .amount
                .split_evenly(group.state.member_ids.len())
                .into_iter()
                .zip(&group.state.member_ids)
                .map(|(share, member)| Split::new(member.clone(), share))
                .collect(),
        };
        for split in &splits {
            group.ensure_member(&split.member_id)?;
        }

        let mut expense = Expense::new(Uuid::new_v4().to_string(), payer_id, title, new.amount, splits);
        expense.validate()?;
        expense.created_by = actor_id.map(ToString::to_string);
        expense.created_at = Some(at);

        let id = expense.id.clone();
        group.expenses.push(expense);
        if let Err(err) = group.balances() {
            group.expenses.pop();
            return Err(err);
        }
        Ok(id)
    }

    impl_soft_delete!(delete_expense, restore_expense, expenses, "expense");

    /// Records a settlement and returns its id.
    ///
    /// The amount is checked against the suggested transfers computed under
    /// the same write lock, so two concurrent submissions for one pair cannot
    /// both pass the check.
    pub fn record_settlement(
        &self,
        group_id: &str,
        new: NewSettlement,
        actor_id: Option<&str>,
    ) -> ResultLedger<String> {
        let mut inner = self.write()?;
        let at = inner.tick();
        let group = inner.group_mut(group_id)?;
        group.ensure_writable(actor_id)?;
        group.ensure_member(&new.from_id)?;
        group.ensure_member(&new.to_id)?;
        if new.from_id == new.to_id {
            return Err(LedgerError::InvalidSplit(
                "a settlement needs two distinct members".to_string(),
            ));
        }

        let balances = group.balances()?;
        let auth = authorize_settlement(&balances, &new.from_id, &new.to_id, new.amount)?;

        let mut settlement = Settlement::new(Uuid::new_v4().to_string(), auth.from_id, auth.to_id, auth.amount);
        settlement.note = normalize_optional_text(new.note.as_deref());
        settlement.created_by = actor_id.map(ToString::to_string);
        settlement.created_at = Some(at);

        let id = settlement.id.clone();
        group.settlements.push(settlement);
        Ok(id)
    }

    /// Records one settlement per suggested transfer, leaving every balance
    /// at zero, and returns them in planning order.
    ///
    /// Planning and recording happen under one write lock. With nothing owed
    /// the result is empty and nothing is written.
    pub fn settle_all(
        &self,
        group_id: &str,
        note: Option<&str>,
        actor_id: Option<&str>,
    ) -> ResultLedger<Vec<Settlement>> {
        let note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(SETTLE_ALL_NOTE)
            .to_string();

        let mut inner = self.write()?;
        let group = inner.group(group_id)?;
        group.ensure_writable(actor_id)?;
        let transfers = plan_transfers(&group.balances()?);

        let mut created = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let at = inner.tick();
            let mut settlement = Settlement::new(
                Uuid::new_v4().to_string(),
                transfer.from_id,
                transfer.to_id,
                transfer.amount,
            );
            settlement.note = note.clone();
            settlement.created_by = actor_id.map(ToString::to_string);
            settlement.created_at = Some(at);
            inner.group_mut(group_id)?.settlements.push(settlement.clone());
            created.push(settlement);
        }
        tracing::debug!("settled group {group_id} with {} transfers", created.len());
        Ok(created)
    }

    impl_soft_delete!(delete_settlement, restore_settlement, settlements, "settlement");
}

impl LedgerSource for MemoryStore {
    fn fetch_active_members(&self, group_id: &str) -> ResultLedger<Vec<MemberId>> {
        Ok(self.read()?.group(group_id)?.state.member_ids.clone())
    }

    fn fetch_active_expenses(&self, group_id: &str) -> ResultLedger<Vec<Expense>> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        Ok(group.expenses.iter().filter(|e| e.active).cloned().collect())
    }

    fn fetch_active_settlements(&self, group_id: &str) -> ResultLedger<Vec<Settlement>> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        Ok(group.settlements.iter().filter(|s| s.active).cloned().collect())
    }

    fn fetch_mutation_log(&self, group_id: &str) -> ResultLedger<MutationLog> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        Ok(MutationLog {
            group: group.state.clone(),
            expenses: group.expenses.clone(),
            settlements: group.settlements.clone(),
            renames: group.renames.clone(),
        })
    }

    fn fetch_snapshot(&self, group_id: &str) -> ResultLedger<LedgerSnapshot> {
        let inner = self.read()?;
        let group = inner.group(group_id)?;
        Ok(LedgerSnapshot {
            members: group.state.member_ids.clone(),
            expenses: group.expenses.iter().filter(|e| e.active).cloned().collect(),
            settlements: group.settlements.iter().filter(|s| s.active).cloned().collect(),
        })
    }
}
