//! Group API endpoints

use api_types::{
    Created,
    group::{
        FinancialSummary, Financials, Group, GroupDetails, GroupNew, GroupRename, ListQuery,
        MemberNew, MemberRole, MemberView,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{TypedHeader, extract::WithRejection};
use ledger::GroupState;

use crate::{
    ServerError,
    balances::{balances_view, transfer_view},
    format_instant,
    server::{ActorHeader, ServerState, actor_id},
};

fn group_view(state: GroupState) -> Group {
    Group {
        id: state.id,
        name: state.name,
        owner_id: state.owner_id,
        member_ids: state.member_ids,
        is_closed: state.closed,
        is_deleted: state.deleted,
        created_at: state.created_at.map(format_instant),
    }
}

fn member_views(state: &GroupState) -> Vec<MemberView> {
    state
        .member_ids
        .iter()
        .map(|id| MemberView {
            id: id.clone(),
            role: if state.is_owner(id) {
                MemberRole::Owner
            } else {
                MemberRole::Member
            },
        })
        .collect()
}

/// Handle requests for creating a new group
///
/// The owner defaults to the acting member.
pub async fn group_new(
    State(state): State<ServerState>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Json(payload), _): WithRejection<Json<GroupNew>, ServerError>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let owner_id = payload
        .owner_id
        .as_deref()
        .or(actor_id(&actor))
        .ok_or_else(|| ServerError::Generic("ownerId or x-actor-id required".to_string()))?;

    let id = state
        .store()
        .create_group(&payload.name, owner_id, &payload.member_ids)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Handle requests for the groups of the acting member, newest first
///
/// Without an `x-actor-id` header every group is listed.
pub async fn list(
    State(state): State<ServerState>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ServerError>,
) -> Result<Json<Vec<Group>>, ServerError> {
    let groups = state
        .store()
        .list_groups(actor_id(&actor), query.include_deleted())?;
    Ok(Json(groups.into_iter().map(group_view).collect()))
}

/// Handle requests for a group with its roster and current financials
pub async fn get(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ServerError>,
) -> Result<Json<GroupDetails>, ServerError> {
    let group = state
        .store()
        .visible_group(&group_id, actor_id(&actor), query.include_deleted())?;
    let summary = state.ledger.summary(&group_id)?;

    let financials = Financials {
        balances: balances_view(&summary.balances),
        summary: FinancialSummary {
            expense_count: summary.totals.expense_count,
            settlement_count: summary.totals.settlement_count,
            total_expenses: summary.totals.total_expenses.to_decimal(),
            total_settled: summary.totals.total_settled.to_decimal(),
        },
        transfers: summary.transfers.into_iter().map(transfer_view).collect(),
    };

    Ok(Json(GroupDetails {
        members: member_views(&group),
        group: group_view(group),
        financials,
    }))
}

pub async fn rename(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Json(payload), _): WithRejection<Json<GroupRename>, ServerError>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.rename_group(&group_id, &payload.name, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}

pub async fn member_new(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Json(payload), _): WithRejection<Json<MemberNew>, ServerError>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.add_member(&group_id, &payload.member_id, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}

/// Owner only
pub async fn close(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.close_group(&group_id, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}

/// Owner only
pub async fn reopen(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.reopen_group(&group_id, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}

/// Handle requests for soft-deleting a group
///
/// Owner only. The group keeps its records and can be restored.
pub async fn delete(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.delete_group(&group_id, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}

/// Owner only
pub async fn restore(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<Json<Group>, ServerError> {
    let store = state.store();
    store.restore_group(&group_id, actor_id(&actor))?;
    Ok(Json(group_view(store.group(&group_id)?)))
}
