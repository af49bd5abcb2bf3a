//! Shared fixtures for integration tests.
//!
//! `users.v1.UserService` exercises every binding source the gateway
//! supports; [`spawn_with`] serves it over both transports on ephemeral ports.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rpc_gateway::context::UploadRef;
use rpc_gateway::{
    send_header, unary, App, AppBuilder, AppError, BizError, HttpOptions, HttpRule, Message,
    RequestContext, RpcOptions, ServiceDescriptor, Status, ValidationError,
};

pub const SERVICE: &str = "users.v1.UserService";
pub const GET_USER: &str = "/users.v1.UserService/GetUser";
pub const CREATE_USER: &str = "/users.v1.UserService/CreateUser";
pub const WHO_AM_I: &str = "/users.v1.UserService/WhoAmI";
pub const SLEEP: &str = "/users.v1.UserService/Sleep";
pub const FILL: &str = "/users.v1.UserService/Fill";

/// Grace period of the fixture app on both transports.
pub const GRACE: Duration = Duration::from_millis(500);

pub const USER_NOT_FOUND_CODE: u32 = 10_404;

pub fn user_not_found() -> BizError {
    BizError::new(USER_NOT_FOUND_CODE, 404, "user not found")
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetUserRequest {
    pub id: String,
    pub active: bool,
}

impl Message for GetUserRequest {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl Message for User {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub org: String,
    pub user: NewUser,
}

impl Message for CreateUserRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.user.email.contains('@') {
            return Err(ValidationError::new("email", "must contain @"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub org: String,
    pub user: User,
}

impl Message for CreateUserResponse {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAvatarRequest {
    pub id: String,
    pub caption: String,
    pub avatar: UploadRef,
}

impl Message for UploadAvatarRequest {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAvatarResponse {
    pub id: String,
    pub caption: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

impl Message for UploadAvatarResponse {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhoAmIRequest {}

impl Message for WhoAmIRequest {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub session: String,
    pub request_id: String,
}

impl Message for WhoAmIResponse {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRequest {
    pub millis: u64,
}

impl Message for SleepRequest {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepResponse {
    pub millis: u64,
}

impl Message for SleepResponse {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRequest {
    pub size: usize,
}

impl Message for FillRequest {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResponse {
    pub text: String,
}

impl Message for FillResponse {}

async fn get_user(ctx: RequestContext, req: GetUserRequest) -> Result<User, Status> {
    match req.id.as_str() {
        "0" => return Err(user_not_found().into()),
        "panic" => panic!("user store exploded"),
        _ => {}
    }
    send_header(&ctx, "x-user-id", [req.id.clone()]);
    Ok(User {
        name: format!("user-{}", req.id),
        email: format!("{}@example.com", req.id),
        id: req.id,
        active: req.active,
    })
}

async fn create_user(ctx: RequestContext, req: CreateUserRequest) -> Result<CreateUserResponse, Status> {
    if let Some(response) = ctx.response() {
        response.set_status(StatusCode::CREATED);
    }
    Ok(CreateUserResponse {
        user: User {
            id: format!("{}-1", req.org),
            name: req.user.name,
            email: req.user.email,
            active: true,
        },
        org: req.org,
    })
}

async fn upload_avatar(
    ctx: RequestContext,
    req: UploadAvatarRequest,
) -> Result<UploadAvatarResponse, Status> {
    let file = ctx
        .uploads()
        .get(req.avatar)
        .ok_or_else(|| Status::invalid_argument("avatar file is required"))?;
    Ok(UploadAvatarResponse {
        id: req.id,
        caption: req.caption,
        file_name: file.file_name.clone().unwrap_or_default(),
        content_type: file.content_type.clone().unwrap_or_default(),
        size: file.data.len() as u64,
    })
}

async fn who_am_i(ctx: RequestContext, _req: WhoAmIRequest) -> Result<WhoAmIResponse, Status> {
    Ok(WhoAmIResponse {
        session: ctx.incoming().get("session").unwrap_or_default().to_string(),
        request_id: ctx.request_id().unwrap_or_default().to_string(),
    })
}

async fn sleep(_ctx: RequestContext, req: SleepRequest) -> Result<SleepResponse, Status> {
    tokio::time::sleep(Duration::from_millis(req.millis)).await;
    Ok(SleepResponse { millis: req.millis })
}

async fn fill(_ctx: RequestContext, req: FillRequest) -> Result<FillResponse, Status> {
    Ok(FillResponse {
        text: "x".repeat(req.size),
    })
}

pub fn user_service() -> ServiceDescriptor {
    ServiceDescriptor::new(SERVICE)
        .method("GetUser", unary(get_user))
        .and_then(|s| s.method("CreateUser", unary(create_user)))
        .and_then(|s| s.method("UploadAvatar", unary(upload_avatar)))
        .and_then(|s| s.method("WhoAmI", unary(who_am_i)))
        .and_then(|s| s.method("Sleep", unary(sleep)))
        .and_then(|s| s.method("Fill", unary(fill)))
        .and_then(|s| s.route("GetUser", HttpRule::get("/api/users/{id}")))
        .and_then(|s| {
            s.route(
                "CreateUser",
                HttpRule::post("/api/orgs/{org}/users")
                    .request_field("user")
                    .response_field("user"),
            )
        })
        .and_then(|s| s.route("UploadAvatar", HttpRule::post("/api/users/{id}/avatar")))
        .and_then(|s| s.route("WhoAmI", HttpRule::get("/api/whoami")))
        .and_then(|s| s.route("Sleep", HttpRule::get("/api/sleep/{millis}")))
        .expect("fixture service is valid")
}

/// A running app serving [`user_service`] on both transports.
pub struct TestApp {
    pub http_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), AppError>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Cancel without waiting.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Cancel and wait for the app to stop.
    pub async fn stop(self) -> Result<(), AppError> {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("app did not stop in time")
            .expect("app task panicked")
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_with(|http| http, |app| app).await
}

/// Spawn the fixture app, letting the caller adjust the HTTP options and the builder.
pub async fn spawn_with(
    http: impl FnOnce(HttpOptions) -> HttpOptions,
    app: impl FnOnce(AppBuilder) -> AppBuilder,
) -> TestApp {
    spawn_configured(http, |rpc| rpc, app).await
}

/// Like [`spawn_with`], also adjusting the RPC options.
pub async fn spawn_configured(
    http: impl FnOnce(HttpOptions) -> HttpOptions,
    rpc: impl FnOnce(RpcOptions) -> RpcOptions,
    app: impl FnOnce(AppBuilder) -> AppBuilder,
) -> TestApp {
    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    let rpc_addr = rpc_listener.local_addr().unwrap();

    let http_options = http(
        HttpOptions::new(http_addr.to_string())
            .listener(http_listener)
            .graceful_timeout(GRACE),
    );
    let rpc_options = rpc(
        RpcOptions::new(rpc_addr.to_string())
            .listener(rpc_listener)
            .graceful_timeout(GRACE),
    );

    let built = app(App::builder("test")
        .http(http_options)
        .rpc(rpc_options)
        .service(user_service()))
    .build()
    .unwrap();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(built.serve(shutdown.clone()));

    TestApp {
        http_addr,
        rpc_addr,
        shutdown,
        handle,
    }
}
