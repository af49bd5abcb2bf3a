//! How request sources layer onto one message over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use rpc_gateway::codec::{Codec, Decoder};
use rpc_gateway::{unary, App, HttpOptions, HttpRule, Message, RequestContext, ServiceDescriptor, Status};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Nested {
    string_value: String,
    int64_value: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Layered {
    string_value: String,
    bool_value: bool,
    double_value: f64,
    int64_value: i64,
    tags: Vec<String>,
    nested_value: Nested,
}

impl Message for Layered {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Typed {
    ids: Vec<i64>,
    flag: Option<bool>,
    count: Option<i64>,
    nested: Option<Nested>,
}

impl Message for Typed {}

fn layer_service() -> ServiceDescriptor {
    let echo = unary(|_ctx: RequestContext, req: Layered| async move { Ok::<_, Status>(req) });
    let typed = unary(|_ctx: RequestContext, req: Typed| async move { Ok::<_, Status>(req) });
    ServiceDescriptor::new("layers.v1.LayerService")
        .method("Echo", echo)
        .and_then(|s| s.method("Typed", typed))
        .and_then(|s| s.route("Typed", HttpRule::get("/v1/typed")))
        .and_then(|s| {
            s.route(
                "Echo",
                HttpRule::post("/v1/layered/{string_value}/{bool_value}").request_field("nested_value"),
            )
        })
        .and_then(|s| s.route("Echo", HttpRule::get("/v1/layered/{string_value}/{bool_value}")))
        .and_then(|s| s.route("Echo", HttpRule::post("/v1/form/{string_value}")))
        .unwrap()
}

async fn serve(codec: Codec) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = App::builder("codec")
        .http(
            HttpOptions::new(addr.to_string())
                .listener(listener)
                .graceful_timeout(Duration::from_millis(200))
                .codec(codec),
        )
        .service(layer_service())
        .build()
        .unwrap();

    let token = CancellationToken::new();
    tokio::spawn(app.serve(token.clone()));
    (addr, token)
}

#[tokio::test]
async fn body_query_and_path_layer_in_priority_order() {
    let (addr, token) = serve(Codec::default()).await;

    let response = reqwest::Client::new()
        .post(format!(
            "http://{addr}/v1/layered/nice/false?double_value=2.75&bool_value=yes&nested_value.string_value=ignored"
        ))
        .json(&json!({"string_value": "foo", "int64_value": 42}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "string_value": "nice",
            "bool_value": false,
            "double_value": 2.75,
            "int64_value": 0,
            "tags": [],
            "nested_value": {"string_value": "foo", "int64_value": 42}
        })
    );

    token.cancel();
}

#[tokio::test]
async fn repeated_and_percent_encoded_values() {
    let (addr, token) = serve(Codec::default()).await;

    let body: Value = reqwest::get(format!(
        "http://{addr}/v1/layered/hello%20world/true?tags=a&tags=b%2Fc&unknown=1"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(body["string_value"], "hello world");
    assert_eq!(body["bool_value"], true);
    assert_eq!(body["tags"], json!(["a", "b/c"]));

    token.cancel();
}

#[tokio::test]
async fn urlencoded_form_binds_like_query() {
    let (addr, token) = serve(Codec::default()).await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/v1/form/formed?double_value=1.5"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("int64_value=9&nested_value.int64_value=5&tags=x")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["string_value"], "formed");
    assert_eq!(body["double_value"], 1.5);
    assert_eq!(body["int64_value"], 9);
    assert_eq!(body["nested_value"]["int64_value"], 5);
    assert_eq!(body["tags"], json!(["x"]));

    token.cancel();
}

#[tokio::test]
async fn invalid_path_value_is_bad_request() {
    let (addr, token) = serve(Codec::default()).await;

    let response = reqwest::get(format!("http://{addr}/v1/layered/x/notabool"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    token.cancel();
}

#[tokio::test]
async fn codec_runs_only_the_configured_decoders() {
    let (addr, token) = serve(Codec::new(vec![Decoder::Path])).await;

    let body: Value = reqwest::get(format!("http://{addr}/v1/layered/only/true?double_value=9.5"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["string_value"], "only");
    assert_eq!(body["double_value"], 0.0);

    token.cancel();
}

#[tokio::test]
async fn empty_repeated_and_unset_optional_fields_take_their_declared_types() {
    let (addr, token) = serve(Codec::default()).await;

    let response = reqwest::get(format!(
        "http://{addr}/v1/typed?ids=1&ids=2&flag=true&count=5&nested.int64_value=7"
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "ids": [1, 2],
            "flag": true,
            "count": 5,
            "nested": {"string_value": "", "int64_value": 7}
        })
    );

    let response = reqwest::get(format!("http://{addr}/v1/typed?flag=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["flag"], true);
    assert_eq!(body["ids"], json!([]));
    assert_eq!(body["count"], Value::Null);

    let response = reqwest::get(format!("http://{addr}/v1/typed?ids=1&ids=two"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    token.cancel();
}
