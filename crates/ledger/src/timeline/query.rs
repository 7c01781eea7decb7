//! Filters and pagination of the timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{Action, EntityType, TimelineEvent};
use crate::{LedgerError, ResultLedger};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_TIMELINE_LIMIT: usize = 20;
/// Largest page size; bigger requests are clamped to it.
pub const MAX_TIMELINE_LIMIT: usize = 50;

/// Raw timeline request parameters, as received from the boundary layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineParams {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
    /// Exclusive upper bound: only events strictly earlier are returned.
    pub before: Option<String>,
}

/// Validated timeline request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TimelineQuery {
    pub entity_type: Option<EntityType>,
    pub action: Option<Action>,
    pub limit: usize,
    pub before: Option<DateTime<Utc>>,
}

impl TimelineQuery {
    pub(crate) fn matches(&self, event: &TimelineEvent) -> bool {
        self.entity_type.is_none_or(|t| event.kind.entity == t)
            && self.action.is_none_or(|a| event.kind.action == a)
            && self.before.is_none_or(|before| event.at < before)
    }
}

impl TryFrom<&TimelineParams> for TimelineQuery {
    type Error = LedgerError;

    fn try_from(params: &TimelineParams) -> Result<Self, Self::Error> {
        let entity_type = non_blank(params.entity_type.as_deref())
            .map(EntityType::try_from)
            .transpose()?;
        let action = non_blank(params.action.as_deref())
            .map(Action::try_from)
            .transpose()?;
        let before = non_blank(params.before.as_deref())
            .map(parse_cursor)
            .transpose()?;

        Ok(Self {
            entity_type,
            action,
            limit: clamp_limit(params.limit),
            before,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        None => DEFAULT_TIMELINE_LIMIT,
        Some(limit) => limit.clamp(1, MAX_TIMELINE_LIMIT as i64) as usize,
    }
}

/// Parses a `before` cursor: an RFC 3339 instant.
pub fn parse_cursor(raw: &str) -> ResultLedger<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| LedgerError::InvalidCursor(format!("before must be an ISO timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn params(entity_type: Option<&str>, action: Option<&str>) -> TimelineParams {
        TimelineParams {
            entity_type: entity_type.map(ToString::to_string),
            action: action.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_when_absent() {
        let query = TimelineQuery::try_from(&TimelineParams::default()).unwrap();
        assert_eq!(query.limit, DEFAULT_TIMELINE_LIMIT);
        assert_eq!(query.entity_type, None);
        assert_eq!(query.action, None);
        assert_eq!(query.before, None);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(Some(999)), MAX_TIMELINE_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(7)), 7);
    }

    #[test]
    fn invalid_filters_are_errors() {
        let err = TimelineQuery::try_from(&params(Some("wallet"), None)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidFilter(_)));

        let err = TimelineQuery::try_from(&params(None, Some("renamed"))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidFilter(_)));

        let blank = TimelineQuery::try_from(&params(Some("  "), Some(""))).unwrap();
        assert_eq!(blank.entity_type, None);
        assert_eq!(blank.action, None);
    }

    #[test]
    fn cursor_must_be_a_timestamp() {
        let err = parse_cursor("not-a-date").unwrap_err();
        assert!(err.is_validation());

        let at = parse_cursor("2026-10-18T12:00:00.250+02:00").unwrap();
        assert_eq!(
            at,
            Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()
                + chrono::TimeDelta::milliseconds(250)
        );
    }
}
