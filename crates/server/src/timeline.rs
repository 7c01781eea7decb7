//! Timeline API endpoint

use api_types::timeline::{EntityView, EventView, TimelineQuery, TimelineResponse};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::{TypedHeader, extract::WithRejection};
use ledger::{TimelineEvent, TimelineParams};

use crate::{
    ServerError, format_instant,
    server::{ActorHeader, ServerState, actor_id},
};

fn params_from_query(query: TimelineQuery) -> Result<TimelineParams, ServerError> {
    let limit = query
        .limit
        .as_deref()
        .map(str::trim)
        .filter(|limit| !limit.is_empty())
        .map(|limit| {
            limit
                .parse::<i64>()
                .map_err(|_| ServerError::Generic(format!("limit must be an integer: {limit}")))
        })
        .transpose()?;

    Ok(TimelineParams {
        entity_type: query.entity_type,
        action: query.action,
        limit,
        before: query.before,
    })
}

fn event_view(event: TimelineEvent) -> EventView {
    EventView {
        id: event.id,
        kind: event.kind.to_string(),
        at: format_instant(event.at),
        actor_user_id: event.actor_id,
        payload: event.entity.payload.clone(),
        entity: EntityView {
            entity_type: event.entity.entity_type.as_str().to_string(),
            id: event.entity.id,
            payload: event.entity.payload,
        },
        title: event.title,
        subtitle: event.subtitle,
    }
}

/// Handle requests for one page of the group activity feed
///
/// Supports `type`, `action`, `limit` (clamped to 1..=50) and the `before`
/// cursor returned as `nextBefore` by the previous page.
pub async fn list(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<TimelineQuery>, ServerError>,
) -> Result<Json<TimelineResponse>, ServerError> {
    let params = params_from_query(query)?;
    state
        .store()
        .visible_group(&group_id, actor_id(&actor), false)?;
    let page = state.ledger.timeline(&group_id, &params)?;

    Ok(Json(TimelineResponse {
        events: page.events.into_iter().map(event_view).collect(),
        next_before: page.next_cursor.map(format_instant),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn blank_limit_is_ignored() {
        let params = params_from_query(TimelineQuery {
            limit: Some(" ".to_string()),
            ..TimelineQuery::default()
        })
        .unwrap();
        assert_eq!(params.limit, None);
    }

    #[test]
    fn malformed_limit_is_rejected() {
        let result = params_from_query(TimelineQuery {
            limit: Some("ten".to_string()),
            ..TimelineQuery::default()
        });
        assert!(matches!(result, Err(ServerError::Generic(_))));
    }

    #[test]
    fn instants_keep_milliseconds() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_instant(at), "2024-03-01T10:00:00.000Z");
    }
}
