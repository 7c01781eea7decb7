//! Shared-expense ledger for groups.
//!
//! Members of a group record expenses, split them exactly between
//! participants, and pay each other back with settlements. The crate turns
//! those records into:
//!
//! - per-member net balances ([`compute_balances`]);
//! - a deterministic list of suggested transfers ([`plan_transfers`]);
//! - a check that caps a new settlement at what is actually owed
//!   ([`authorize_settlement`]);
//! - a paginated, filterable activity feed ([`assemble_timeline`]).
//!
//! Records are read through the [`LedgerSource`] trait. [`MemoryStore`] is the
//! bundled implementation and also owns the write rules.
//!
//! ```
//! use ledger::{Ledger, MemoryStore, NewExpense, Money};
//!
//! let store = MemoryStore::new();
//! let group = store.create_group("Trip", "alice", &["bob".to_string()]).unwrap();
//! store
//!     .add_expense(
//!         &group,
//!         NewExpense {
//!             title: "Dinner".to_string(),
//!             amount: Money::new(6000),
//!             payer_id: None,
//!             splits: None,
//!         },
//!         Some("alice"),
//!     )
//!     .unwrap();
//!
//! let ledger = Ledger::builder().source(store).build().unwrap();
//! let transfers = ledger.suggested_transfers(&group).unwrap();
//! assert_eq!(transfers[0].from_id, "bob");
//! assert_eq!(transfers[0].amount, Money::new(3000));
//! ```

pub use balances::{BalanceMap, compute_balances};
pub use error::LedgerError;
pub use expenses::{Expense, Split};
pub use group::{GroupState, RenameRecord};
pub use guard::{SettlementAuthorization, authorize_settlement};
pub use memory::{MemoryStore, NewExpense, NewSettlement, SETTLE_ALL_NOTE};
pub use money::Money;
pub use settlements::Settlement;
pub use source::{GroupTotals, LedgerSnapshot, LedgerSource, MutationLog};
pub use timeline::{
    Action, DEFAULT_TIMELINE_LIMIT, EntityType, EventEntity, EventKind, MAX_TIMELINE_LIMIT,
    TimelineEvent, TimelinePage, TimelineParams, assemble_timeline, assemble_timeline_at,
    parse_cursor,
};
pub use transfers::{Transfer, plan_transfers};

mod balances;
mod error;
mod expenses;
mod group;
mod guard;
mod memory;
mod money;
mod settlements;
mod source;
mod timeline;
mod transfers;
mod util;

/// Member identifier, as issued by the identity layer.
pub type MemberId = String;

pub type ResultLedger<T> = Result<T, LedgerError>;

/// Balances, suggested transfers and activity totals of a group, computed
/// from one snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSummary {
    pub balances: BalanceMap,
    pub transfers: Vec<Transfer>,
    pub totals: GroupTotals,
}

/// Read-side facade over a [`LedgerSource`].
///
/// Every call reads a fresh snapshot; nothing is cached between calls.
#[derive(Debug)]
pub struct Ledger<S> {
    source: S,
}

impl<S: LedgerSource> Ledger<S> {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder<S> {
        LedgerBuilder::default()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn balances(&self, group_id: &str) -> ResultLedger<BalanceMap> {
        self.source.fetch_snapshot(group_id)?.balances()
    }

    pub fn suggested_transfers(&self, group_id: &str) -> ResultLedger<Vec<Transfer>> {
        Ok(plan_transfers(&self.balances(group_id)?))
    }

    /// Balances, the transfers planned from them and the activity totals,
    /// all from the same read.
    pub fn summary(&self, group_id: &str) -> ResultLedger<GroupSummary> {
        let snapshot = self.source.fetch_snapshot(group_id)?;
        let balances = snapshot.balances()?;
        let transfers = plan_transfers(&balances);
        Ok(GroupSummary {
            balances,
            transfers,
            totals: snapshot.totals()?,
        })
    }

    /// Checks a proposed settlement against the group's current balances.
    ///
    /// This is a read-only check. [`MemoryStore::record_settlement`] repeats
    /// it under its write lock when the settlement is stored.
    pub fn authorize_settlement(
        &self,
        group_id: &str,
        from_id: &str,
        to_id: &str,
        amount: Money,
    ) -> ResultLedger<SettlementAuthorization> {
        let balances = self.balances(group_id)?;
        authorize_settlement(&balances, from_id, to_id, amount)
    }

    pub fn timeline(&self, group_id: &str, params: &TimelineParams) -> ResultLedger<TimelinePage> {
        let log = self.source.fetch_mutation_log(group_id)?;
        assemble_timeline(&log, params)
    }
}

#[derive(Debug)]
pub struct LedgerBuilder<S> {
    source: Option<S>,
}

impl<S> Default for LedgerBuilder<S> {
    fn default() -> Self {
        Self { source: None }
    }
}

impl<S: LedgerSource> LedgerBuilder<S> {
    /// Pass the required record source
    pub fn source(mut self, source: S) -> LedgerBuilder<S> {
        self.source = Some(source);
        self
    }

    /// Construct `Ledger`
    pub fn build(self) -> ResultLedger<Ledger<S>> {
        let source = self
            .source
            .ok_or_else(|| LedgerError::Storage("ledger built without a source".to_string()))?;
        Ok(Ledger { source })
    }
}
