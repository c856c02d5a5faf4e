use super::*;
use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::protocol::Endpoint;
use std::{collections::HashMap, time::Duration};
use tokio::net::TcpListener;

const DEVICE_USER: &str = "feather";
const DEVICE_PASS: &str = "ducky";

async fn handle_fetch_payloads() -> Json<Vec<&'static str>> {
    Json(vec!["b.dd", "a.dd"])
}

async fn handle_load_payload(Query(params): Query<HashMap<String, String>>) -> String {
    // plain text on purpose: the client must not care about content type
    format!(
        r#"{{"payload":"loaded {}"}}"#,
        params.get("file").cloned().unwrap_or_default()
    )
}

async fn handle_run_payload(
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(serde_json::json!({
        "result": params.get("payload").cloned().unwrap_or_default(),
        "notification": content_type,
    }))
}

async fn handle_statistics(headers: HeaderMap) -> (StatusCode, String) {
    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{DEVICE_USER}:{DEVICE_PASS}"))
    );
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if authorized {
        (StatusCode::OK, "{}".to_string())
    } else {
        (StatusCode::UNAUTHORIZED, String::new())
    }
}

async fn handle_save_payload() -> (StatusCode, &'static str) {
    (StatusCode::CREATED, r#"{"result":"success","notification":"ok"}"#)
}

async fn handle_slow_statistics() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn handle_garbled_payloads() -> Vec<u8> {
    vec![b'[', 0xff, 0xfe, b']']
}

fn device_routes() -> Router {
    Router::new()
        .route("/api/fetchPayloads", get(handle_fetch_payloads))
        .route("/api/loadPayload", get(handle_load_payload))
        .route("/api/runPayload", post(handle_run_payload))
        .route("/api/statistics", get(handle_statistics))
        .route("/api/savePayload", post(handle_save_payload))
}

async fn serve(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn spawn_device() -> String {
    serve(device_routes()).await
}

fn transport_for(device_url: String) -> HttpTransport {
    HttpTransport::new(&ClientSettings {
        device_url,
        ..ClientSettings::default()
    })
    .expect("transport")
}

#[tokio::test]
async fn get_returns_raw_body_of_ok_response() {
    let device = spawn_device().await;
    let transport = transport_for(device);

    let body = transport
        .send(&DeviceRequest::new(Endpoint::ListPayloads))
        .await
        .expect("list");

    assert_eq!(body, r#"["b.dd","a.dd"]"#);
}

#[tokio::test]
async fn get_params_are_url_encoded_query_fields() {
    let device = spawn_device().await;
    let transport = transport_for(device);

    let body = transport
        .send(&DeviceRequest::new(Endpoint::LoadPayload).with_param("file", "a b&c.dd"))
        .await
        .expect("load");

    assert_eq!(body, r#"{"payload":"loaded a b&c.dd"}"#);
}

#[tokio::test]
async fn post_params_are_a_form_encoded_body() {
    let device = spawn_device().await;
    let transport = transport_for(device);

    let body = transport
        .send(&DeviceRequest::new(Endpoint::RunPayload).with_param("payload", "STRING a=1&b+c %"))
        .await
        .expect("run");

    let value: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(value["result"], "STRING a=1&b+c %");
    assert_eq!(value["notification"], "application/x-www-form-urlencoded");
}

#[tokio::test]
async fn any_status_other_than_200_is_a_transport_error() {
    let device = spawn_device().await;
    let transport = transport_for(device);

    let err = transport
        .send(&DeviceRequest::new(Endpoint::SavePayload))
        .await
        .expect_err("201 is not 200");

    assert_eq!(err.status, Some(201));
}

#[tokio::test]
async fn credentials_are_sent_as_basic_auth() {
    let device = spawn_device().await;
    let anonymous = transport_for(device.clone());
    let authenticated = HttpTransport::new(&ClientSettings {
        device_url: device,
        username: Some(DEVICE_USER.into()),
        password: Some(DEVICE_PASS.into()),
        ..ClientSettings::default()
    })
    .expect("transport");
    let request = DeviceRequest::new(Endpoint::FetchStatistics);

    let err = anonymous.send(&request).await.expect_err("needs auth");
    let body = authenticated.send(&request).await.expect("authorized");

    assert_eq!(err, TransportError::status(401, "Unauthorized"));
    assert_eq!(body, "{}");
}

#[tokio::test]
async fn slow_device_times_out() {
    let device = serve(Router::new().route("/api/statistics", get(handle_slow_statistics))).await;
    let transport = HttpTransport::new(&ClientSettings {
        device_url: device,
        request_timeout: Some(Duration::from_millis(100)),
        ..ClientSettings::default()
    })
    .expect("transport");

    let err = transport
        .send(&DeviceRequest::new(Endpoint::FetchStatistics))
        .await
        .expect_err("must time out");

    assert_eq!(err, TransportError::timed_out());
}

#[tokio::test]
async fn invalid_utf8_body_is_a_transport_error() {
    let device =
        serve(Router::new().route("/api/fetchPayloads", get(handle_garbled_payloads))).await;
    let transport = transport_for(device);

    let err = transport
        .send(&DeviceRequest::new(Endpoint::ListPayloads))
        .await
        .expect_err("body is not text");

    assert_eq!(err.status, None);
    assert!(err.cause.contains("utf-8"), "cause: {}", err.cause);
}

#[tokio::test]
async fn unreachable_device_has_no_status() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let transport = transport_for(format!("http://{addr}"));

    let err = transport
        .send(&DeviceRequest::new(Endpoint::ListPayloads))
        .await
        .expect_err("nothing listening");

    assert_eq!(err.status, None);
    assert!(err.cause.contains("failed to connect"), "cause: {}", err.cause);
}

#[test]
fn endpoint_urls_resolve_against_device_root() {
    let transport = transport_for("http://192.168.4.1/ui/".into());
    let url = transport.endpoint_url("/api/statistics").expect("url");
    assert_eq!(url.as_str(), "http://192.168.4.1/api/statistics");
}
