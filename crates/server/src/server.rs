use axum::{
    Router,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::sync::Arc;

use crate::{balances, expenses, groups, settlements, timeline};
use ledger::{Ledger, LedgerError, MemoryStore};

static ACTOR_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-actor-id");

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Arc<Ledger<MemoryStore>>,
}

impl ServerState {
    pub fn new(store: MemoryStore) -> Result<Self, LedgerError> {
        let ledger = Ledger::builder().source(store).build()?;
        Ok(Self {
            ledger: Arc::new(ledger),
        })
    }

    pub(crate) fn store(&self) -> &MemoryStore {
        self.ledger.source()
    }
}

/// `TypedHeader` for the acting member
///
/// Writes are attributed to the member named in the "x-actor-id" entry of the
/// header. The header is optional.
#[derive(Debug)]
pub(crate) struct ActorHeader(String);

impl Header for ActorHeader {
    fn name() -> &'static axum::http::HeaderName {
        &ACTOR_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(ActorHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-actor-id header"),
        }
    }
}

/// Acting member of a request, when the caller named one.
pub(crate) fn actor_id(header: &Option<TypedHeader<ActorHeader>>) -> Option<&str> {
    header.as_ref().map(|TypedHeader(actor)| actor.0.as_str())
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", post(groups::group_new).get(groups::list))
        .route(
            "/groups/{group_id}",
            get(groups::get)
                .patch(groups::rename)
                .delete(groups::delete),
        )
        .route("/groups/{group_id}/restore", post(groups::restore))
        .route("/groups/{group_id}/members", post(groups::member_new))
        .route("/groups/{group_id}/close", post(groups::close))
        .route("/groups/{group_id}/reopen", post(groups::reopen))
        .route("/groups/{group_id}/balances", get(balances::get))
        .route("/groups/{group_id}/timeline", get(timeline::list))
        .route(
            "/groups/{group_id}/expenses",
            post(expenses::expense_new).get(expenses::list),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}",
            axum::routing::delete(expenses::delete),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}/restore",
            post(expenses::restore),
        )
        .route(
            "/groups/{group_id}/settlements",
            post(settlements::settlement_new).get(settlements::list),
        )
        .route(
            "/groups/{group_id}/settlements/history",
            get(settlements::history),
        )
        .route("/groups/{group_id}/settle-all", post(settlements::settle_all))
        .route(
            "/groups/{group_id}/settlements/{settlement_id}",
            axum::routing::delete(settlements::delete),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}/restore",
            post(settlements::restore),
        )
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
