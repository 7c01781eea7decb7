use api_types::balances::{Balances, BalancesResponse, TransferView};
use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::TypedHeader;
use ledger::{BalanceMap, Transfer};

use crate::{
    ServerError,
    server::{ActorHeader, ServerState, actor_id},
};

/// Balances keyed by member, in roster order.
pub(crate) fn balances_view(balances: &BalanceMap) -> Balances {
    balances
        .iter()
        .map(|(member, amount)| (member.to_string(), amount.to_decimal()))
        .collect()
}

pub(crate) fn transfer_view(transfer: Transfer) -> TransferView {
    TransferView {
        from_user_id: transfer.from_id,
        to_user_id: transfer.to_id,
        amount: transfer.amount.to_decimal(),
    }
}

/// Handle requests for the balances and suggested transfers of a group
pub async fn get(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    actor: Option<TypedHeader<ActorHeader>>,
) -> Result<Json<BalancesResponse>, ServerError> {
    state
        .store()
        .visible_group(&group_id, actor_id(&actor), false)?;
    let summary = state.ledger.summary(&group_id)?;

    Ok(Json(BalancesResponse {
        balances: balances_view(&summary.balances),
        transfers: summary.transfers.into_iter().map(transfer_view).collect(),
    }))
}
