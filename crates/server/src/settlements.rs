//! Settlement API endpoints

use api_types::{
    Created,
    group::ListQuery,
    settlement::{
        HistoryItem, SettleAllNew, SettleAllResponse, SettlementHistory, SettlementNew,
        SettlementStatus, SettlementView,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{TypedHeader, extract::WithRejection};
use ledger::{NewSettlement, Settlement};

use crate::{
    ServerError, format_instant, money_from_wire,
    server::{ActorHeader, ServerState, actor_id},
};

fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        id: settlement.id,
        from_user_id: settlement.from_id,
        to_user_id: settlement.to_id,
        amount: settlement.amount.to_decimal(),
        note: settlement.note,
        is_deleted: !settlement.active,
        created_by_user_id: settlement.created_by,
        created_at: settlement.created_at.map(format_instant),
        deleted_by_user_id: settlement.deleted_by.filter(|_| !settlement.active),
        deleted_at: settlement
            .deleted_at
            .filter(|_| !settlement.active)
            .map(format_instant),
    }
}

fn history_item(settlement: Settlement) -> HistoryItem {
    HistoryItem {
        status: if settlement.active {
            SettlementStatus::Active
        } else {
            SettlementStatus::Deleted
        },
        event_at: settlement.status_at().map(format_instant),
        settlement: settlement_view(settlement),
    }
}

/// Handle requests for the settlements of a group, newest first
///
/// Soft-deleted settlements are listed with `includeDeleted=true`.
pub async fn list(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ServerError>,
) -> Result<Json<Vec<SettlementView>>, ServerError> {
    let settlements =
        state
            .store()
            .list_settlements(&group_id, actor_id(&actor), query.include_deleted())?;
    Ok(Json(settlements.into_iter().map(settlement_view).collect()))
}

/// Handle requests for every settlement of a group, deleted ones included,
/// ordered by their latest status change
pub async fn history(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ServerError>,
) -> Result<Json<SettlementHistory>, ServerError> {
    let settlements =
        state
            .store()
            .settlement_history(&group_id, actor_id(&actor), query.include_deleted())?;
    let items: Vec<HistoryItem> = settlements.into_iter().map(history_item).collect();

    Ok(Json(SettlementHistory {
        group_id,
        count: items.len(),
        items,
    }))
}

/// Handle requests for recording a payment between two members
///
/// Rejected with 409 when nothing is owed in that direction or when the
/// amount exceeds what is owed.
pub async fn settlement_new(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Json(payload), _): WithRejection<Json<SettlementNew>, ServerError>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let new = NewSettlement {
        from_id: payload.from_user_id,
        to_id: payload.to_user_id,
        amount: money_from_wire(payload.amount)?,
        note: payload.note,
    };
    let id = state
        .store()
        .record_settlement(&group_id, new, actor_id(&actor))?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Handle requests for settling every suggested transfer at once
///
/// Answers 201 with the recorded settlements, or 200 with an empty list when
/// nothing is owed. The body and its `note` are optional.
pub async fn settle_all(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(payload, _): WithRejection<Option<Json<SettleAllNew>>, ServerError>,
) -> Result<(StatusCode, Json<SettleAllResponse>), ServerError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let created = state
        .store()
        .settle_all(&group_id, payload.note.as_deref(), actor_id(&actor))?;

    if created.is_empty() {
        return Ok((
            StatusCode::OK,
            Json(SettleAllResponse {
                group_id,
                created_count: 0,
                settlements: Vec::new(),
                transfers_used: Vec::new(),
                message: Some("Nothing to settle".to_string()),
            }),
        ));
    }

    let transfers_used = created
        .iter()
        .map(|settlement| api_types::balances::TransferView {
            from_user_id: settlement.from_id.clone(),
            to_user_id: settlement.to_id.clone(),
            amount: settlement.amount.to_decimal(),
        })
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(SettleAllResponse {
            group_id,
            created_count: created.len(),
            settlements: created.into_iter().map(settlement_view).collect(),
            transfers_used,
            message: None,
        }),
    ))
}

/// Group owner or author only
pub async fn delete(
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(String, String)>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<StatusCode, ServerError> {
    state
        .store()
        .delete_settlement(&group_id, &settlement_id, actor_id(&actor))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(String, String)>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<StatusCode, ServerError> {
    state
        .store()
        .restore_settlement(&group_id, &settlement_id, actor_id(&actor))?;
    Ok(StatusCode::NO_CONTENT)
}
