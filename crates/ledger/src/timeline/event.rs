//! Timeline event shapes and the normalization of raw mutations into them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Expense, GroupState, LedgerError, MemberId, RenameRecord, Settlement, util::to_millis};

/// Kind of entity an event is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityType {
    Group,
    Expense,
    Settlement,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Expense => "expense",
            Self::Settlement => "settlement",
        }
    }
}

impl TryFrom<&str> for EntityType {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "group" => Ok(Self::Group),
            "expense" => Ok(Self::Expense),
            "settlement" => Ok(Self::Settlement),
            other => Err(LedgerError::InvalidFilter(format!(
                "invalid type: {other} (expected group, expense or settlement)"
            ))),
        }
    }
}

/// What happened to the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Deleted,
    Restored,
    Closed,
    Reopened,
    Updated,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Updated => "updated",
        }
    }
}

impl TryFrom<&str> for Action {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "created" => Ok(Self::Created),
            "deleted" => Ok(Self::Deleted),
            "restored" => Ok(Self::Restored),
            "closed" => Ok(Self::Closed),
            "reopened" => Ok(Self::Reopened),
            "updated" => Ok(Self::Updated),
            other => Err(LedgerError::InvalidFilter(format!(
                "invalid action: {other} (expected created, deleted, restored, closed, reopened or updated)"
            ))),
        }
    }
}

/// `{entity}_{action}`, e.g. `expense_created`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKind {
    pub entity: EntityType,
    pub action: Action,
}

impl EventKind {
    pub const fn new(entity: EntityType, action: Action) -> Self {
        Self { entity, action }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.entity.as_str(), self.action.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventEntity {
    pub entity_type: EntityType,
    pub id: String,
    pub payload: Value,
}

/// One normalized entry of the group timeline.
///
/// The wire shape (`actorUserId`, preformatted `at`) is built by the HTTP
/// layer; this type carries no serialization of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEvent {
    pub id: String,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    pub actor_id: Option<MemberId>,
    pub entity: EventEntity,
    pub title: String,
    pub subtitle: Option<String>,
}

/// A raw mutation, tagged by the source it was synthesized from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SourceEvent<'a> {
    Group(GroupEvent<'a>),
    Expense(Action, &'a Expense),
    Settlement(Action, &'a Settlement),
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum GroupEvent<'a> {
    Closed(&'a GroupState),
    Reopened(&'a GroupState),
    Renamed(&'a GroupState, &'a RenameRecord),
}

impl<'a> SourceEvent<'a> {
    fn kind(&self) -> EventKind {
        match self {
            Self::Group(GroupEvent::Closed(_)) => EventKind::new(EntityType::Group, Action::Closed),
            Self::Group(GroupEvent::Reopened(_)) => {
                EventKind::new(EntityType::Group, Action::Reopened)
            }
            Self::Group(GroupEvent::Renamed(..)) => {
                EventKind::new(EntityType::Group, Action::Updated)
            }
            Self::Expense(action, _) => EventKind::new(EntityType::Expense, *action),
            Self::Settlement(action, _) => EventKind::new(EntityType::Settlement, *action),
        }
    }

    fn entity_id(&self) -> &'a str {
        match *self {
            Self::Group(
                GroupEvent::Closed(group)
                | GroupEvent::Reopened(group)
                | GroupEvent::Renamed(group, _),
            ) => &group.id,
            Self::Expense(_, expense) => &expense.id,
            Self::Settlement(_, settlement) => &settlement.id,
        }
    }

    fn raw_at(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Group(GroupEvent::Closed(group)) => group.closed_at,
            Self::Group(GroupEvent::Reopened(group)) => group.reopened_at,
            Self::Group(GroupEvent::Renamed(_, record)) => record.at,
            Self::Expense(action, e) => stamp_for(action, e.created_at, e.deleted_at, e.restored_at),
            Self::Settlement(action, s) => {
                stamp_for(action, s.created_at, s.deleted_at, s.restored_at)
            }
        }
    }

    fn actor_id(&self) -> Option<&'a MemberId> {
        match *self {
            Self::Group(GroupEvent::Closed(group)) => group.closed_by.as_ref(),
            Self::Group(GroupEvent::Reopened(group)) => group.reopened_by.as_ref(),
            Self::Group(GroupEvent::Renamed(_, record)) => record.actor_id.as_ref(),
            Self::Expense(action, e) => {
                actor_for(action, &e.created_by, &e.deleted_by, &e.restored_by)
            }
            Self::Settlement(action, s) => {
                actor_for(action, &s.created_by, &s.deleted_by, &s.restored_by)
            }
        }
    }

    fn payload(&self) -> Value {
        match *self {
            Self::Group(GroupEvent::Closed(group) | GroupEvent::Reopened(group)) => {
                json!({ "name": group.name })
            }
            Self::Group(GroupEvent::Renamed(_, record)) => json!({
                "before": { "name": record.before },
                "after": { "name": record.after },
            }),
            Self::Expense(_, e) => json!({
                "title": e.title,
                "amount": e.amount,
                "paidByUserId": e.payer_id,
                "splits": e
                    .splits
                    .iter()
                    .map(|s| json!({ "userId": s.member_id, "share": s.share }))
                    .collect::<Vec<_>>(),
            }),
            Self::Settlement(_, s) => json!({
                "fromUserId": s.from_id,
                "toUserId": s.to_id,
                "amount": s.amount,
                "note": s.note,
            }),
        }
    }

    fn title_and_subtitle(&self) -> (String, Option<String>) {
        match *self {
            Self::Group(GroupEvent::Closed(_)) => ("Group closed".to_string(), None),
            Self::Group(GroupEvent::Reopened(_)) => ("Group reopened".to_string(), None),
            Self::Group(GroupEvent::Renamed(_, record)) => (
                "Group renamed".to_string(),
                Some(format!("{} -> {}", record.before, record.after)),
            ),
            Self::Expense(Action::Created, e) => (
                e.title.clone(),
                Some(format!("{} paid by {}", e.amount, e.payer_id)),
            ),
            Self::Expense(Action::Deleted, e) => {
                ("Expense deleted".to_string(), Some(e.title.clone()))
            }
            Self::Expense(_, e) => ("Expense restored".to_string(), Some(e.title.clone())),
            Self::Settlement(action, s) => {
                let title = match action {
                    Action::Deleted => "Settlement deleted",
                    Action::Restored => "Settlement restored",
                    _ => "Settlement",
                };
                (
                    title.to_string(),
                    Some(format!("{} -> {}: {}", s.from_id, s.to_id, s.amount)),
                )
            }
        }
    }

    /// Stable id: the record's own id when it has one, otherwise a name-based
    /// UUID over kind, entity and source timestamp.
    fn event_id(&self, kind: EventKind) -> String {
        if let Self::Group(GroupEvent::Renamed(_, record)) = self
            && !record.id.is_empty()
        {
            return record.id.clone();
        }
        let stamp = self
            .raw_at()
            .map(|at| to_millis(at).timestamp_millis().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let name = format!("{kind}:{}:{stamp}", self.entity_id());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Converts the raw mutation into the canonical event shape.
    ///
    /// A missing timestamp falls back to `now`.
    pub(crate) fn normalize(&self, now: DateTime<Utc>) -> TimelineEvent {
        let kind = self.kind();
        let at = match self.raw_at() {
            Some(at) => to_millis(at),
            None => {
                tracing::debug!("{kind} {} has no timestamp, using now", self.entity_id());
                now
            }
        };
        let payload = self.payload();
        let (title, subtitle) = self.title_and_subtitle();

        TimelineEvent {
            id: self.event_id(kind),
            kind,
            at,
            actor_id: self.actor_id().cloned(),
            entity: EventEntity {
                entity_type: kind.entity,
                id: self.entity_id().to_string(),
                payload,
            },
            title,
            subtitle,
        }
    }
}

fn stamp_for(
    action: Action,
    created_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    restored_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match action {
        Action::Deleted => deleted_at,
        Action::Restored => restored_at,
        _ => created_at,
    }
}

fn actor_for<'a>(
    action: Action,
    created_by: &'a Option<MemberId>,
    deleted_by: &'a Option<MemberId>,
    restored_by: &'a Option<MemberId>,
) -> Option<&'a MemberId> {
    match action {
        Action::Deleted => deleted_by.as_ref(),
        Action::Restored => restored_by.as_ref(),
        _ => created_by.as_ref(),
    }
}
