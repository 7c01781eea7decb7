//! Group timeline: a reverse-chronological feed synthesized on every read
//! from the current state of the group, its expenses and settlements, and the
//! rename audit trail.
//!
//! Event sources:
//!
//! - `group_closed` / `group_reopened` for the latest close and reopen;
//! - `group_updated` for each rename audit record;
//! - `expense_created`, plus `expense_deleted` while soft-deleted and
//!   `expense_restored` once restored;
//! - the same three for settlements.
//!
//! Pagination walks newest to older with an exact `before` instant. Events
//! sharing the instant of the page boundary are not revisited, so timestamps
//! are kept at millisecond precision end to end.

use chrono::{DateTime, Utc};

use crate::{MutationLog, ResultLedger, util::to_millis};

mod event;
mod query;

pub use event::{Action, EntityType, EventEntity, EventKind, TimelineEvent};
use event::{GroupEvent, SourceEvent};
pub use query::{DEFAULT_TIMELINE_LIMIT, MAX_TIMELINE_LIMIT, TimelineParams, parse_cursor};
use query::TimelineQuery;

/// One page of the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelinePage {
    pub events: Vec<TimelineEvent>,
    /// Instant of the last returned event when the page is full; `None` once
    /// the feed is exhausted. A cursor only means there *may* be more.
    pub next_cursor: Option<DateTime<Utc>>,
}

/// Assembles one timeline page, using the current time for events without a
/// timestamp.
pub fn assemble_timeline(log: &MutationLog, params: &TimelineParams) -> ResultLedger<TimelinePage> {
    assemble_timeline_at(log, params, Utc::now())
}

/// Assembles one timeline page with an explicit "now".
///
/// Fails only on invalid parameters (unknown filter value, unparsable
/// cursor).
pub fn assemble_timeline_at(
    log: &MutationLog,
    params: &TimelineParams,
    now: DateTime<Utc>,
) -> ResultLedger<TimelinePage> {
    let query = TimelineQuery::try_from(params)?;
    let now = to_millis(now);

    let mut events: Vec<TimelineEvent> = source_events(log)
        .iter()
        .map(|source| source.normalize(now))
        .filter(|event| query.matches(event))
        .collect();
    events.sort_by(|a, b| b.at.cmp(&a.at));
    events.truncate(query.limit);

    let next_cursor = if events.len() == query.limit {
        events.last().map(|event| event.at)
    } else {
        None
    };

    Ok(TimelinePage {
        events,
        next_cursor,
    })
}

fn source_events(log: &MutationLog) -> Vec<SourceEvent<'_>> {
    let group = &log.group;
    let mut sources = Vec::new();

    if group.closed_at.is_some() {
        sources.push(SourceEvent::Group(GroupEvent::Closed(group)));
    }
    if group.reopened_at.is_some() {
        sources.push(SourceEvent::Group(GroupEvent::Reopened(group)));
    }
    sources.extend(
        log.renames
            .iter()
            .map(|record| SourceEvent::Group(GroupEvent::Renamed(group, record))),
    );

    for expense in &log.expenses {
        sources.push(SourceEvent::Expense(Action::Created, expense));
        if !expense.active {
            sources.push(SourceEvent::Expense(Action::Deleted, expense));
        }
        if expense.restored_at.is_some() {
            sources.push(SourceEvent::Expense(Action::Restored, expense));
        }
    }

    for settlement in &log.settlements {
        sources.push(SourceEvent::Settlement(Action::Created, settlement));
        if !settlement.active {
            sources.push(SourceEvent::Settlement(Action::Deleted, settlement));
        }
        if settlement.restored_at.is_some() {
            sources.push(SourceEvent::Settlement(Action::Restored, settlement));
        }
    }

    sources
}
