//! HTTP 服务
//!
//! `/auth`、`/oauth2callback` 返回纯文本/HTML，`/send-mail` 返回 JSON
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::trace::TraceLayer;

use crate::mail::{MailSender, gmail::TokenManager};

pub mod handlers;
pub mod response;

/// 请求间共享的状态
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub sender: Arc<MailSender>,
}

impl AppState {
    pub fn new(sender: MailSender) -> Self {
        let tokens = sender.tokens().clone();
        Self {
            tokens,
            sender: Arc::new(sender),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(handlers::auth_link))
        .route("/oauth2callback", get(handlers::oauth_callback))
        .route("/send-mail", post(handlers::send_mail))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 监听并运行，收到 Ctrl+C / SIGTERM 后优雅退出
pub async fn serve<A: ToSocketAddrs>(addr: A, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    if let Ok(local) = listener.local_addr() {
        tracing::info!("🚀 Gmail mail server running on http://{}", local);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("收到退出信号，开始优雅关机...");
}
