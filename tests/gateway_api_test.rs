// Integration tests for the gateway API against a mocked platform

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use connect_gateway::api::{create_gateway_router, GatewayAppState};
use connect_gateway::config::GatewayConfig;
use connect_gateway::identity::HeaderIdentity;
use connect_gateway::platform::ConnectClient;
use connect_gateway::Gateway;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use tower::ServiceExt;

const CALLER: &str = "user-1";

async fn mock_platform_token(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"pd_test","expires_in":3600}"#)
        .create_async()
        .await
}

fn create_test_app(server: &ServerGuard) -> Router {
    let mut config = GatewayConfig::default();
    config.platform.base_url = server.url();
    config.platform.project_id = "proj_1".to_string();
    config.platform.client_id = "client".to_string();
    config.platform.client_secret = "secret".to_string();
    config.platform.request_timeout_seconds = 5;
    config.connect.default_allowed_origin = "https://app.example.com".to_string();
    config.cascade.max_concurrency = 2;
    config.server.operator_ids = vec![CALLER.to_string()];

    let client = ConnectClient::new(&config.platform).unwrap();
    let gateway = Gateway::new(Arc::new(client), &config);
    create_gateway_router(GatewayAppState {
        gateway: Arc::new(gateway),
        identity: Arc::new(HeaderIdentity::default()),
    })
}

fn account_json(id: &str, tenant: &str, healthy: bool, dead: bool) -> String {
    format!(
        r#"{{"id": "{}", "external_id": "{}", "healthy": {}, "dead": {},
            "app": {{"id": "app_slack", "name_slug": "slack", "name": "Slack"}},
            "credentials": {{"oauth_access_token": "xoxb-{}"}},
            "created_at": "2026-02-17T10:00:00Z", "updated_at": "2026-02-17T12:00:00Z"}}"#,
        id, tenant, healthy, dead, id
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-external-user-id", CALLER)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-external-user-id", CALLER)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-external-user-id", CALLER)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_list_accounts_is_scoped_and_omits_credentials() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let accounts = server
        .mock("GET", "/connect/proj_1/accounts")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("external_user_id".into(), CALLER.into()),
            Matcher::UrlEncoded("include_credentials".into(), "false".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"data": [{}], "page_info": {{"count": 1, "end_cursor": null}}}}"#,
            account_json("apn_1", CALLER, true, false)
        ))
        .expect(1)
        .create_async()
        .await;

    let (status, json) = send(create_test_app(&server), get("/api/accounts")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"][0]["account_id"], "apn_1");
    assert!(json["data"][0].get("credentials").is_none());
    accounts.assert_async().await;
}

#[tokio::test]
async fn test_cascade_delete_reports_each_failure() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _list = server
        .mock("GET", "/connect/proj_1/accounts")
        .match_query(Matcher::UrlEncoded("app".into(), "slack".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"data": [{}, {}], "page_info": {{"count": 2}}}}"#,
            account_json("a1", "user-1", true, false),
            account_json("a2", "user-2", false, true)
        ))
        .create_async()
        .await;
    let deleted = server
        .mock("DELETE", "/connect/proj_1/accounts/a1")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let failed = server
        .mock("DELETE", "/connect/proj_1/accounts/a2")
        .with_status(500)
        .with_body(r#"{"error": "invalid credentials"}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        delete("/api/apps/slack/accounts"),
    )
    .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["kind"], "PartialFailure");
    assert_eq!(json["data"]["total"], 2);
    assert_eq!(json["data"]["deleted"], serde_json::json!(["a1"]));
    assert_eq!(json["data"]["failed"][0]["id"], "a2");
    assert_eq!(json["data"]["failed"][0]["kind"], "UpstreamError");
    assert!(json["data"]["failed"][0]["message"]
        .as_str()
        .unwrap()
        .contains("invalid credentials"));
    deleted.assert_async().await;
    failed.assert_async().await;
}

#[tokio::test]
async fn test_cascade_enumeration_failure_is_error() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _list = server
        .mock("GET", "/connect/proj_1/accounts")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("service unavailable")
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        delete("/api/apps/slack/accounts"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["kind"], "UpstreamError");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_connect_token_uses_default_origin() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let tokens = server
        .mock("POST", "/connect/proj_1/tokens")
        .match_body(Matcher::Json(serde_json::json!({
            "external_user_id": CALLER,
            "allowed_origins": ["https://app.example.com"],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "ctok_1", "expires_at": "2026-02-17T14:00:00Z"}"#)
        .expect(1)
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        post_json("/api/connect/tokens", serde_json::json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["token"], "ctok_1");
    assert_eq!(json["data"]["tenant"], CALLER);
    tokens.assert_async().await;
}

#[tokio::test]
async fn test_connect_token_empty_origins_never_reaches_platform() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let tokens = server
        .mock("POST", "/connect/proj_1/tokens")
        .expect(0)
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        post_json(
            "/api/connect/tokens",
            serde_json::json!({"allowed_origins": []}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["kind"], "InvalidArgument");
    tokens.assert_async().await;
}

const ADD_ROW: &str = r#"{"data": {
    "key": "sheets-add-row",
    "name": "Add Single Row",
    "configurable_props": [
        {"name": "googleSheets", "type": "app", "app": "google_sheets"},
        {"name": "spreadsheet", "type": "string", "remoteOptions": true},
        {"name": "sheet", "type": "string", "remoteOptions": true, "dependsOn": ["spreadsheet"]}
    ]
}}"#;

#[tokio::test]
async fn test_configure_dependent_prop() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _component = server
        .mock("GET", "/connect/proj_1/actions/sheets-add-row")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ADD_ROW)
        .create_async()
        .await;
    let configure = server
        .mock("POST", "/connect/proj_1/components/configure")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "external_user_id": CALLER,
            "id": "sheets-add-row",
            "prop_name": "sheet",
            "configured_props": {"spreadsheet": "ss_1"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"options": [{"label": "Q1", "value": "sh_1"}], "errors": []}"#)
        .expect(1)
        .create_async()
        .await;

    // Dependency not yet configured
    let (status, json) = send(
        create_test_app(&server),
        post_json(
            "/api/components/configure",
            serde_json::json!({
                "component": "sheets-add-row",
                "external_user_id": CALLER,
                "prop_name": "sheet",
                "configured_props": {}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["kind"], "MissingDependency");
    assert_eq!(json["error"]["missing"], serde_json::json!(["spreadsheet"]));

    let (status, json) = send(
        create_test_app(&server),
        post_json(
            "/api/components/configure",
            serde_json::json!({
                "component": "sheets-add-row",
                "external_user_id": CALLER,
                "prop_name": "sheet",
                "configured_props": {"spreadsheet": "ss_1"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["prop_name"], "sheet");
    assert_eq!(json["data"]["options"][0]["label"], "Q1");
    assert_eq!(json["data"]["options"][0]["value"], "sh_1");
    configure.assert_async().await;
}

#[tokio::test]
async fn test_configure_remote_errors_are_upstream() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _component = server
        .mock("GET", "/connect/proj_1/actions/sheets-add-row")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ADD_ROW)
        .create_async()
        .await;
    let _configure = server
        .mock("POST", "/connect/proj_1/components/configure")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"options": [], "errors": ["invalid credentials"]}"#)
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        post_json(
            "/api/components/configure",
            serde_json::json!({
                "component": "sheets-add-row",
                "external_user_id": CALLER,
                "prop_name": "spreadsheet",
                "configured_props": {}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["kind"], "UpstreamError");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("invalid credentials"));
}

#[tokio::test]
async fn test_get_unknown_component_is_not_found() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _component = server
        .mock("GET", "/connect/proj_1/triggers/nope")
        .with_status(404)
        .with_body(r#"{"error": "component not found"}"#)
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        get("/api/components/triggers/nope"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["kind"], "NotFound");
}

#[tokio::test]
async fn test_list_apps_passes_cursor() {
    let mut server = Server::new_async().await;
    let _token = mock_platform_token(&mut server).await;
    let _apps = server
        .mock("GET", "/apps")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "google".into()),
            Matcher::UrlEncoded("after".into(), "c1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data": [{"id": "app_2", "name_slug": "google_sheets", "name": "Google Sheets"}],
                "page_info": {"count": 1, "end_cursor": "c2"}}"#,
        )
        .create_async()
        .await;

    let (status, json) = send(
        create_test_app(&server),
        get("/api/apps?q=google&cursor=c1"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["data"][0]["slug"], "google_sheets");
    assert_eq!(json["data"]["next_cursor"], "c2");
}
