// File: src/app.rs
use crate::audit::{AuditSink, FileAuditSink};
use crate::config::AppConfig;
use crate::network;
use crate::sip::router::Router;
use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::convert::Infallible;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::select;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

pub struct App {
    config: Arc<AppConfig>,
}

async fn health_check_handler(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::from(r#"{"status":"ok"}"#)))
}

fn spawn_http_server(config: Arc<AppConfig>) -> (JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        let make_svc = make_service_fn(|_conn| async {
            Ok::<_, Infallible>(service_fn(health_check_handler))
        });

        let server = Server::bind(&addr)
            .serve(make_svc)
            .with_graceful_shutdown(async {
                rx.await.ok();
            });

        info!(address = %addr, "HTTP health check server started.");
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server error.");
        }
    });
    (handle, tx)
}

impl App {
    pub async fn bootstrap() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Arc::new(AppConfig::load_from_env().context("failed to load configuration")?);

        let rust_log_env =
            env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,tower=warn".to_string());
        let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&rust_log_env))?;
        let subscriber = Registry::default().with(env_filter);

        if config.env == "development" {
            subscriber.with(fmt::layer().with_target(true).with_line_number(true)).init();
        } else {
            subscriber.with(fmt::layer().json().with_current_span(true).with_span_list(true)).init();
        }

        info!(
            service_name = "sip-relay",
            version = %config.service_version,
            commit = %config.git_commit,
            build_date = %config.build_date,
            profile = %config.env,
            "🚀 Service starting..."
        );
        Ok(Self { config })
    }

    pub async fn run(self) -> Result<()> {
        let router = Arc::new(Mutex::new(Router::new(
            self.config.own_via_prefix(),
            self.config.record_route(),
        )));
        let audit: Arc<dyn AuditSink> = Arc::new(
            FileAuditSink::open(&self.config.audit_log_path).with_context(|| {
                format!("failed to open call log at {}", self.config.audit_log_path)
            })?,
        );
        info!(
            listen = %self.config.listen_addr,
            advertised = %format!("{}:{}", self.config.public_ip, self.config.public_port),
            call_log = %self.config.audit_log_path,
            "✅ Relay ready."
        );

        let (http_server_handle, http_shutdown_tx) = spawn_http_server(self.config.clone());
        let network_task = network::listen_and_process(self.config.clone(), router, audit);

        select! {
            res = network_task => {
                if let Err(e) = res { error!(error = %e, "fatal UDP network error."); }
            },
            res = http_server_handle => {
                if let Err(e) = res { error!(error = %e, "fatal HTTP server error."); }
            },
            _ = signal::ctrl_c() => {
                warn!("shutdown signal (Ctrl+C) received.");
            }
        }

        let _ = http_shutdown_tx.send(());
        info!("✅ Service stopped cleanly.");
        Ok(())
    }
}
