use std::{collections::HashSet, sync::Arc, thread};

use chrono::SecondsFormat;

use ledger::{
    Ledger, LedgerError, LedgerSource, MAX_TIMELINE_LIMIT, MemoryStore, Money, NewExpense,
    NewSettlement, Split, TimelineParams, Transfer,
};

fn ledger_with_group(owner: &str, others: &[&str]) -> (Ledger<Arc<MemoryStore>>, String) {
    let store = Arc::new(MemoryStore::new());
    let members: Vec<String> = others.iter().map(ToString::to_string).collect();
    let group_id = store.create_group("Trip", owner, &members).unwrap();
    let ledger = Ledger::builder().source(store).build().unwrap();
    (ledger, group_id)
}

fn even_expense(title: &str, cents: i64) -> NewExpense {
    NewExpense {
        title: title.to_string(),
        amount: Money::new(cents),
        payer_id: None,
        splits: None,
    }
}

fn payment(from: &str, to: &str, cents: i64) -> NewSettlement {
    NewSettlement {
        from_id: from.to_string(),
        to_id: to.to_string(),
        amount: Money::new(cents),
        note: None,
    }
}

fn cursor(page: &ledger::TimelinePage) -> Option<String> {
    page.next_cursor
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[test]
fn even_split_then_settle_up() {
    let (ledger, gid) = ledger_with_group("A", &["B"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Lunch", 1000), Some("A")).unwrap();

    let summary = ledger.summary(&gid).unwrap();
    assert_eq!(summary.balances.get("A"), Some(Money::new(500)));
    assert_eq!(summary.balances.get("B"), Some(Money::new(-500)));
    assert_eq!(
        summary.transfers,
        vec![Transfer {
            from_id: "B".to_string(),
            to_id: "A".to_string(),
            amount: Money::new(500),
        }]
    );

    store.record_settlement(&gid, payment("B", "A", 500), Some("B")).unwrap();

    let balances = ledger.balances(&gid).unwrap();
    assert_eq!(balances.get("A"), Some(Money::ZERO));
    assert_eq!(balances.get("B"), Some(Money::ZERO));
    assert!(ledger.suggested_transfers(&gid).unwrap().is_empty());
}

#[test]
fn balances_always_sum_to_zero() {
    let (ledger, gid) = ledger_with_group("a", &["b", "c", "d"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Fuel", 10_000), Some("a")).unwrap();
    store.add_expense(&gid, even_expense("Tolls", 1_001), Some("b")).unwrap();
    let custom = NewExpense {
        payer_id: Some("c".to_string()),
        splits: Some(vec![
            Split::new("a", Money::new(1_234)),
            Split::new("d", Money::new(766)),
        ]),
        ..even_expense("Museum", 2_000)
    };
    store.add_expense(&gid, custom, Some("c")).unwrap();
    store.record_settlement(&gid, payment("d", "a", 1_000), Some("d")).unwrap();

    let balances = ledger.balances(&gid).unwrap();
    assert_eq!(balances.total(), Money::ZERO);

    let transfers = ledger.suggested_transfers(&gid).unwrap();
    assert_eq!(transfers, ledger.suggested_transfers(&gid).unwrap());

    let mut settled = balances.clone();
    for transfer in &transfers {
        settled
            .apply_settlement(&transfer.from_id, &transfer.to_id, transfer.amount)
            .unwrap();
    }
    assert!(settled.iter().all(|(_, amount)| amount.is_zero()));
}

#[test]
fn deleted_records_leave_the_balances_and_come_back_on_restore() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    let eid = store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();

    store.delete_expense(&gid, &eid, Some("a")).unwrap();
    assert!(ledger.suggested_transfers(&gid).unwrap().is_empty());

    store.restore_expense(&gid, &eid, Some("a")).unwrap();
    assert_eq!(ledger.balances(&gid).unwrap().get("b"), Some(Money::new(-3000)));
}

#[test]
fn guard_caps_settlement_at_the_owed_amount() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();

    let ok = ledger
        .authorize_settlement(&gid, "b", "a", Money::from_decimal(30.00).unwrap())
        .unwrap();
    assert_eq!(ok.owed, Money::new(3000));

    assert_eq!(
        ledger.authorize_settlement(&gid, "b", "a", Money::from_decimal(30.01).unwrap()),
        Err(LedgerError::ExceedsOwed {
            requested: Money::new(3001),
            max_allowed: Money::new(3000),
        })
    );
    assert_eq!(
        ledger.authorize_settlement(&gid, "a", "b", Money::new(100)),
        Err(LedgerError::NothingOwed {
            from: "a".to_string(),
            to: "b".to_string(),
        })
    );
}

#[test]
fn concurrent_settlements_cannot_both_pass_the_guard() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = Arc::clone(ledger.source());
    store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let gid = gid.clone();
            thread::spawn(move || store.record_settlement(&gid, payment("b", "a", 3000), Some("b")))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, LedgerError::NothingOwed { .. }))
    );
    assert_eq!(store.fetch_active_settlements(&gid).unwrap().len(), 1);
}

#[test]
fn timeline_contains_every_kind_of_activity() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();
    store.record_settlement(&gid, payment("b", "a", 1000), Some("b")).unwrap();
    store.close_group(&gid, Some("a")).unwrap();

    let page = ledger.timeline(&gid, &TimelineParams::default()).unwrap();
    let kinds: Vec<String> = page.events.iter().map(|e| e.kind.to_string()).collect();
    assert_eq!(kinds, vec!["group_closed", "settlement_created", "expense_created"]);
    assert_eq!(page.events[0].actor_id.as_deref(), Some("a"));
    assert_eq!(page.events[1].actor_id.as_deref(), Some("b"));
    assert_eq!(page.next_cursor, None);
}

#[test]
fn timeline_pages_are_disjoint_and_clamped() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    for i in 0..60 {
        store
            .add_expense(&gid, even_expense(&format!("Round {i}"), 200), Some("a"))
            .unwrap();
    }

    let first = ledger
        .timeline(
            &gid,
            &TimelineParams {
                limit: Some(2),
                ..TimelineParams::default()
            },
        )
        .unwrap();
    assert_eq!(first.events.len(), 2);
    assert_eq!(first.events[0].title, "Round 59");

    let second = ledger
        .timeline(
            &gid,
            &TimelineParams {
                limit: Some(2),
                before: cursor(&first),
                ..TimelineParams::default()
            },
        )
        .unwrap();
    let first_ids: HashSet<_> = first.events.iter().map(|e| e.id.clone()).collect();
    assert!(second.events.iter().all(|e| !first_ids.contains(&e.id)));
    assert_eq!(second.events[0].title, "Round 57");

    let oversized = ledger
        .timeline(
            &gid,
            &TimelineParams {
                limit: Some(999),
                ..TimelineParams::default()
            },
        )
        .unwrap();
    assert_eq!(oversized.events.len(), MAX_TIMELINE_LIMIT);
}

#[test]
fn timeline_filters_by_entity_and_action() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    let eid = store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();
    store.delete_expense(&gid, &eid, Some("a")).unwrap();
    store.rename_group(&gid, "Ski trip", Some("a")).unwrap();

    let deleted = ledger
        .timeline(
            &gid,
            &TimelineParams {
                entity_type: Some("expense".to_string()),
                action: Some("deleted".to_string()),
                ..TimelineParams::default()
            },
        )
        .unwrap();
    assert_eq!(deleted.events.len(), 1);
    assert_eq!(deleted.events[0].subtitle.as_deref(), Some("Dinner"));

    let renamed = ledger
        .timeline(
            &gid,
            &TimelineParams {
                action: Some("updated".to_string()),
                ..TimelineParams::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.events.len(), 1);
    assert_eq!(renamed.events[0].entity.payload["after"]["name"], "Ski trip");

    assert!(matches!(
        ledger.timeline(
            &gid,
            &TimelineParams {
                before: Some("not-a-date".to_string()),
                ..TimelineParams::default()
            },
        ),
        Err(LedgerError::InvalidCursor(_))
    ));
}

#[test]
fn closed_group_keeps_its_reads() {
    let (ledger, gid) = ledger_with_group("a", &["b"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Dinner", 6000), Some("a")).unwrap();
    store.close_group(&gid, Some("a")).unwrap();

    assert_eq!(
        store.record_settlement(&gid, payment("b", "a", 3000), Some("b")),
        Err(LedgerError::GroupClosed(gid.clone()))
    );
    assert_eq!(ledger.suggested_transfers(&gid).unwrap().len(), 1);
    assert!(ledger.timeline(&gid, &TimelineParams::default()).is_ok());
}

#[test]
fn settle_all_empties_the_summary() {
    let (ledger, gid) = ledger_with_group("a", &["b", "c"]);
    let store = ledger.source();
    store.add_expense(&gid, even_expense("Cabin", 9000), Some("a")).unwrap();
    store.add_expense(&gid, even_expense("Groceries", 3001), Some("b")).unwrap();

    let before = ledger.summary(&gid).unwrap();
    assert_eq!(before.totals.expense_count, 2);
    assert_eq!(before.totals.total_expenses, Money::new(12_001));
    assert_eq!(before.totals.total_settled, Money::ZERO);

    let created = store.settle_all(&gid, Some("  "), Some("c")).unwrap();
    assert_eq!(
        created
            .iter()
            .map(|s| Transfer {
                from_id: s.from_id.clone(),
                to_id: s.to_id.clone(),
                amount: s.amount,
            })
            .collect::<Vec<_>>(),
        before.transfers
    );

    let after = ledger.summary(&gid).unwrap();
    assert!(after.transfers.is_empty());
    assert!(after.balances.iter().all(|(_, amount)| amount.is_zero()));
    assert_eq!(after.totals.settlement_count, created.len());
    assert_eq!(
        Some(after.totals.total_settled),
        Money::checked_sum(created.iter().map(|s| s.amount))
    );
}

#[test]
fn unknown_group_is_reported() {
    let (ledger, _) = ledger_with_group("a", &[]);
    assert!(matches!(
        ledger.balances("missing"),
        Err(LedgerError::KeyNotFound(_))
    ));
}

#[test]
fn builder_requires_a_source() {
    assert!(matches!(
        Ledger::<MemoryStore>::builder().build(),
        Err(LedgerError::Storage(_))
    ));
}
