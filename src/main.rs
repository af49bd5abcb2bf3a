//! rpc-gateway binary.
//!
//! Loads configuration, installs logging, metrics and signal handling, then
//! serves a demo echo service over both transports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};

use rpc_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use rpc_gateway::http::cookie_annotator;
use rpc_gateway::interceptor;
use rpc_gateway::observability::{init_logging, init_metrics};
use rpc_gateway::service::{MethodInfo, RouteError};
use rpc_gateway::{
    lifecycle, send_header, unary, App, HttpOptions, HttpRule, Message, RequestContext, RpcOptions,
    ServiceDescriptor, Status, ValidationError,
};

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "Serve services over RPC and HTTP/JSON", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override http.bind_address
    #[arg(long)]
    http_addr: Option<String>,

    /// Override rpc.bind_address
    #[arg(long)]
    rpc_addr: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EchoRequest {
    message: String,
    uppercase: bool,
}

impl Message for EchoRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.message.is_empty() {
            return Err(ValidationError::new("message", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EchoResponse {
    message: String,
}

impl Message for EchoResponse {}

fn echo_service() -> Result<ServiceDescriptor, RouteError> {
    let echo = unary(|ctx: RequestContext, req: EchoRequest| async move {
        send_header(&ctx, "x-echo-length", [req.message.len().to_string()]);
        let message = if req.uppercase {
            req.message.to_uppercase()
        } else {
            req.message
        };
        Ok::<_, Status>(EchoResponse { message })
    });

    ServiceDescriptor::new("echo.v1.EchoService")
        .method("Echo", echo)?
        .route("Echo", HttpRule::get("/v1/echo/{message}"))?
        .route("Echo", HttpRule::post("/v1/echo"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(addr) = cli.http_addr {
        config.http.bind_address = addr;
    }
    if let Some(addr) = cli.rpc_addr {
        config.rpc.bind_address = addr;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-gateway starting");

    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = lifecycle::install()?;

    let access_log = interceptor::from_fn(|ctx, req, info: Arc<MethodInfo>, next| async move {
        let start = Instant::now();
        let transport = ctx.transport().as_str();
        let result = next(ctx, req).await;
        tracing::info!(
            full_method = %info.full_method,
            transport,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Call finished"
        );
        result
    });

    let mut builder = App::builder("rpc-gateway")
        .interceptor(access_log)
        .service(echo_service()?);
    if config.http.enabled {
        let annotate_cookies = cookie_annotator();
        builder = builder.http(
            HttpOptions::from_config(&config.http)
                .metadata_annotator(move |request, md| annotate_cookies(request, md)),
        );
    }
    if config.rpc.enabled {
        builder = builder.rpc(RpcOptions::from_config(&config.rpc));
    }

    builder.build()?.serve(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
