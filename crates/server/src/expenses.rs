//! Expense API endpoints

use api_types::{
    Created,
    expense::{ExpenseNew, ExpenseView, SplitView},
    group::ListQuery,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::{TypedHeader, extract::WithRejection};
use ledger::{Expense, NewExpense, Split};

use crate::{
    ServerError, format_instant, money_from_wire,
    server::{ActorHeader, ServerState, actor_id},
};

fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        title: expense.title,
        amount: expense.amount.to_decimal(),
        paid_by_user_id: expense.payer_id,
        splits: expense
            .splits
            .into_iter()
            .map(|split| SplitView {
                user_id: split.member_id,
                share: split.share.to_decimal(),
            })
            .collect(),
        is_deleted: !expense.active,
        created_by_user_id: expense.created_by,
        created_at: expense.created_at.map(format_instant),
        deleted_by_user_id: expense.deleted_by.filter(|_| !expense.active),
        deleted_at: expense.deleted_at.filter(|_| !expense.active).map(format_instant),
    }
}

/// Handle requests for the expenses of a group, newest first
///
/// Soft-deleted expenses are listed with `includeDeleted=true`.
pub async fn list(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, ServerError>,
) -> Result<Json<Vec<ExpenseView>>, ServerError> {
    let expenses =
        state
            .store()
            .list_expenses(&group_id, actor_id(&actor), query.include_deleted())?;
    Ok(Json(expenses.into_iter().map(expense_view).collect()))
}

/// Handle requests for recording a new expense
pub async fn expense_new(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
    WithRejection(Json(payload), _): WithRejection<Json<ExpenseNew>, ServerError>,
) -> Result<(StatusCode, Json<Created>), ServerError> {
    let splits = payload
        .splits
        .map(|splits| {
            splits
                .into_iter()
                .map(|split| -> Result<Split, ServerError> {
                    Ok(Split::new(split.user_id, money_from_wire(split.share)?))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let new = NewExpense {
        title: payload.title,
        amount: money_from_wire(payload.amount)?,
        payer_id: payload.paid_by_user_id,
        splits,
    };
    let id = state.store().add_expense(&group_id, new, actor_id(&actor))?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Group owner, payer or author only
pub async fn delete(
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, String)>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<StatusCode, ServerError> {
    state
        .store()
        .delete_expense(&group_id, &expense_id, actor_id(&actor))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, String)>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<StatusCode, ServerError> {
    state
        .store()
        .restore_expense(&group_id, &expense_id, actor_id(&actor))?;
    Ok(StatusCode::NO_CONTENT)
}
