use std::collections::HashSet;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use ledger::MemoryStore;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use server::{ServerState, router};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn app() -> Router {
    router(ServerState::new(MemoryStore::new()).unwrap())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request.header("x-actor-id", actor);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn raw_body(app: &Router, uri: &str) -> Result<String, Box<dyn std::error::Error>> {
    let request = Request::builder().uri(uri).body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(String::from_utf8(bytes.to_vec())?)
}

async fn group_with(app: &Router, owner: &str, members: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let (status, body) = send(
        app,
        Method::POST,
        "/groups",
        Some(owner),
        Some(json!({ "name": "Trip", "memberIds": members })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(body["id"].as_str().unwrap_or_default().to_string())
}

async fn dinner(app: &Router, gid: &str, payer: &str, amount: f64) -> Result<String, Box<dyn std::error::Error>> {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/groups/{gid}/expenses"),
        Some(payer),
        Some(json!({ "title": "Dinner", "amount": amount })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(body["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn balances_and_transfers_follow_expenses_and_settlements() -> TestResult {
    let app = app();
    let gid = group_with(&app, "A", &["B"]).await?;
    dinner(&app, &gid, "A", 10.0).await?;

    let (status, body) = send(&app, Method::GET, &format!("/groups/{gid}/balances"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balances"], json!({ "A": 5.0, "B": -5.0 }));
    assert_eq!(
        body["transfers"],
        json!([{ "fromUserId": "B", "toUserId": "A", "amount": 5.0 }])
    );

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/groups/{gid}/settlements"),
        Some("B"),
        Some(json!({ "fromUserId": "B", "toUserId": "A", "amount": 5 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, &format!("/groups/{gid}/balances"), None, None).await?;
    assert_eq!(body["balances"], json!({ "A": 0.0, "B": 0.0 }));
    assert_eq!(body["transfers"], json!([]));
    Ok(())
}

#[tokio::test]
async fn settlement_over_the_owed_amount_is_a_conflict() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    dinner(&app, &gid, "a", 60.0).await?;
    let uri = format!("/groups/{gid}/settlements");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some("b"),
        Some(json!({ "fromUserId": "b", "toUserId": "a", "amount": 30.01 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SETTLEMENT_EXCEEDS_OWED");
    assert_eq!(body["maxAllowed"], 30.0);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some("a"),
        Some(json!({ "fromUserId": "a", "toUserId": "b", "amount": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOTHING_OWED");
    assert!(body.get("maxAllowed").is_none());

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some("b"),
        Some(json!({ "fromUserId": "b", "toUserId": "a", "amount": 30 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn closed_group_rejects_writes() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    let eid = dinner(&app, &gid, "a", 10.0).await?;

    let (status, body) = send(&app, Method::POST, &format!("/groups/{gid}/close"), Some("a"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isClosed"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{gid}/expenses"),
        Some("a"),
        Some(json!({ "title": "Taxi", "amount": 12.5 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "GROUP_CLOSED");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/groups/{gid}/expenses/{eid}"),
        Some("a"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::POST, &format!("/groups/{gid}/reopen"), Some("a"), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/groups/{gid}/expenses/{eid}"),
        Some("a"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn invalid_expenses_are_validation_errors() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{gid}/expenses"),
        Some("a"),
        Some(json!({
            "title": "Dinner",
            "amount": 10,
            "splits": [{ "userId": "a", "share": 6 }, { "userId": "b", "share": 3 }]
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{gid}/expenses"),
        Some("a"),
        Some(json!({ "title": "Dinner", "amount": -4 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn unknown_group_is_not_found() -> TestResult {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/groups/nope/balances", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn timeline_pages_with_next_before() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    for amount in [10.0, 20.0, 30.0, 40.0] {
        dinner(&app, &gid, "a", amount).await?;
    }

    let (status, first) = send(&app, Method::GET, &format!("/groups/{gid}/timeline?limit=2"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let events = first["events"].as_array().cloned().unwrap_or_default();
    assert_eq!(events.len(), 2);
    let event = &events[0];
    assert_eq!(event["kind"], "expense_created");
    assert_eq!(event["actorUserId"], "a");
    assert_eq!(event["entity"]["type"], "expense");
    assert_eq!(event["payload"], event["entity"]["payload"]);
    assert_eq!(event["payload"]["amount"], 40.0);
    assert_eq!(event["subtitle"], "40.00 paid by a");
    assert!(event["at"].as_str().unwrap_or_default().ends_with('Z'));

    let before = first["nextBefore"].as_str().unwrap_or_default().to_string();
    assert!(!before.is_empty());
    let (status, second) = send(
        &app,
        Method::GET,
        &format!("/groups/{gid}/timeline?limit=2&before={before}"),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let first_ids: HashSet<String> = events
        .iter()
        .filter_map(|e| e["id"].as_str().map(ToString::to_string))
        .collect();
    let second_events = second["events"].as_array().cloned().unwrap_or_default();
    assert_eq!(second_events.len(), 2);
    assert!(
        second_events
            .iter()
            .filter_map(|e| e["id"].as_str())
            .all(|id| !first_ids.contains(id))
    );
    Ok(())
}

#[tokio::test]
async fn timeline_rejects_bad_parameters() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &[]).await?;

    for query in ["before=not-a-date", "type=wallet", "action=exploded", "limit=ten"] {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/groups/{gid}/timeline?{query}"),
            None,
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert_eq!(body["code"], "VALIDATION_ERROR", "{query}");
    }

    let (status, body) = send(&app, Method::GET, &format!("/groups/{gid}/timeline?limit=999"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"], json!([]));
    assert_eq!(body["nextBefore"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn rename_shows_up_as_group_updated() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &[]).await?;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/groups/{gid}"),
        Some("a"),
        Some(json!({ "name": "Ski trip" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ski trip");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/groups/{gid}/timeline?action=updated"),
        None,
        None,
    )
    .await?;
    assert_eq!(body["events"][0]["kind"], "group_updated");
    assert_eq!(body["events"][0]["payload"]["before"]["name"], "Trip");
    assert_eq!(body["events"][0]["payload"]["after"]["name"], "Ski trip");
    Ok(())
}

#[tokio::test]
async fn group_without_owner_is_rejected() -> TestResult {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/groups", None, Some(json!({ "name": "Trip" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn malformed_json_bodies_are_validation_errors() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{gid}/settlements"),
        Some("b"),
        Some(json!({ "fromUserId": "b", "toUserId": "a" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().is_some_and(|m| m.contains("amount")));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/groups/{gid}/expenses"))
        .header("x-actor-id", "a")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").map(|v| v.as_bytes()),
        Some(&b"application/json"[..])
    );
    Ok(())
}

#[tokio::test]
async fn only_the_owner_closes_deletes_and_restores() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;

    for path in ["close", "reopen", "restore"] {
        let (status, body) = send(&app, Method::POST, &format!("/groups/{gid}/{path}"), Some("b"), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
        assert_eq!(body["code"], "FORBIDDEN", "{path}");
    }
    let (status, _) = send(&app, Method::DELETE, &format!("/groups/{gid}"), Some("b"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::DELETE, &format!("/groups/{gid}"), Some("a"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isDeleted"], true);

    let (status, body) = send(&app, Method::GET, &format!("/groups/{gid}"), Some("b"), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "GROUP_DELETED");
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/groups/{gid}?includeDeleted=true"),
        Some("a"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, &format!("/groups/{gid}/restore"), Some("a"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isDeleted"], false);
    let (status, _) = send(&app, Method::GET, &format!("/groups/{gid}"), Some("b"), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn records_are_deleted_by_their_author_or_the_owner() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b", "c"]).await?;
    let eid = dinner(&app, &gid, "b", 30.0).await?;
    let uri = format!("/groups/{gid}/expenses/{eid}");

    let (status, body) = send(&app, Method::DELETE, &uri, Some("c"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    let (status, _) = send(&app, Method::DELETE, &uri, Some("outsider"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &uri, Some("b"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::POST, &format!("{uri}/restore"), Some("a"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn groups_are_listed_and_detailed() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    group_with(&app, "z", &[]).await?;
    dinner(&app, &gid, "a", 10.0).await?;

    let (status, body) = send(&app, Method::GET, "/groups", Some("b"), None).await?;
    assert_eq!(status, StatusCode::OK);
    let groups = body.as_array().cloned().unwrap_or_default();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], gid.as_str());
    assert_eq!(groups[0]["isClosed"], false);

    let (status, body) = send(&app, Method::GET, &format!("/groups/{gid}"), Some("b"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["ownerId"], "a");
    assert_eq!(
        body["members"],
        json!([{ "id": "a", "role": "owner" }, { "id": "b", "role": "member" }])
    );
    assert_eq!(body["financials"]["balances"], json!({ "a": 5.0, "b": -5.0 }));
    assert_eq!(body["financials"]["summary"]["expenseCount"], 1);
    assert_eq!(body["financials"]["summary"]["settlementCount"], 0);
    assert_eq!(body["financials"]["summary"]["totalExpenses"], 10.0);
    assert_eq!(body["financials"]["summary"]["totalSettled"], 0.0);
    assert_eq!(
        body["financials"]["transfers"],
        json!([{ "fromUserId": "b", "toUserId": "a", "amount": 5.0 }])
    );
    Ok(())
}

#[tokio::test]
async fn deleted_records_are_listed_on_request() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    let kept = dinner(&app, &gid, "a", 10.0).await?;
    let dropped = dinner(&app, &gid, "a", 20.0).await?;
    send(&app, Method::DELETE, &format!("/groups/{gid}/expenses/{dropped}"), Some("a"), None).await?;

    let (status, body) = send(&app, Method::GET, &format!("/groups/{gid}/expenses"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["id"], kept.as_str());

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/groups/{gid}/expenses?includeDeleted=TRUE"),
        None,
        None,
    )
    .await?;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["id"], dropped.as_str());
    assert_eq!(body[0]["isDeleted"], true);
    assert_eq!(body[0]["deletedByUserId"], "a");
    Ok(())
}

#[tokio::test]
async fn settlement_history_keeps_deleted_settlements() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b"]).await?;
    dinner(&app, &gid, "a", 40.0).await?;
    let uri = format!("/groups/{gid}/settlements");

    let mut ids = Vec::new();
    for amount in [5, 7] {
        let (_, body) = send(
            &app,
            Method::POST,
            &uri,
            Some("b"),
            Some(json!({ "fromUserId": "b", "toUserId": "a", "amount": amount })),
        )
        .await?;
        ids.push(body["id"].as_str().unwrap_or_default().to_string());
    }
    let (status, _) = send(&app, Method::DELETE, &format!("{uri}/{}", ids[0]), Some("b"), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, &uri, None, None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = send(&app, Method::GET, &format!("{uri}/history"), None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groupId"], gid.as_str());
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["id"], ids[0].as_str());
    assert_eq!(body["items"][0]["status"], "deleted");
    assert_eq!(body["items"][0]["eventAt"], body["items"][0]["deletedAt"]);
    assert_eq!(body["items"][1]["status"], "active");
    assert_eq!(body["items"][1]["eventAt"], body["items"][1]["createdAt"]);
    Ok(())
}

#[tokio::test]
async fn settle_all_clears_every_debt() -> TestResult {
    let app = app();
    let gid = group_with(&app, "a", &["b", "c"]).await?;
    dinner(&app, &gid, "a", 90.0).await?;
    let uri = format!("/groups/{gid}/settle-all");

    let (status, body) = send(&app, Method::POST, &uri, Some("a"), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["createdCount"], 2);
    assert_eq!(body["settlements"][0]["note"], "Settle all");
    assert_eq!(body["settlements"][0]["createdByUserId"], "a");
    assert_eq!(
        body["transfersUsed"],
        json!([
            { "fromUserId": "b", "toUserId": "a", "amount": 30.0 },
            { "fromUserId": "c", "toUserId": "a", "amount": 30.0 }
        ])
    );

    let (_, balances) = send(&app, Method::GET, &format!("/groups/{gid}/balances"), None, None).await?;
    assert_eq!(balances["transfers"], json!([]));

    let (status, body) = send(&app, Method::POST, &uri, Some("a"), Some(json!({ "note": "again" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["createdCount"], 0);
    assert_eq!(body["message"], "Nothing to settle");
    Ok(())
}

#[tokio::test]
async fn balances_keep_roster_order_on_the_wire() -> TestResult {
    let app = app();
    let gid = group_with(&app, "zoe", &["adam"]).await?;
    dinner(&app, &gid, "adam", 10.0).await?;

    let body = raw_body(&app, &format!("/groups/{gid}/balances")).await?;
    let zoe = body.find("\"zoe\"").unwrap_or(usize::MAX);
    let adam = body.find("\"adam\"").unwrap_or(0);
    assert!(zoe < adam, "{body}");
    Ok(())
}

#[tokio::test]
async fn spawned_server_answers_over_tcp() -> TestResult {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = server::spawn_with_listener(ServerState::new(MemoryStore::new())?, listener)?;

    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    stream
        .write_all(b"GET /groups/missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;

    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(response.contains("NOT_FOUND"));
    Ok(())
}
