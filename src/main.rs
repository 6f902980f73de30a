use anyhow::{Context, Result};
use std::sync::Arc;

mod config;
mod mail;
mod server;
mod utils;

#[cfg(test)]
mod test_support;

use config::storage::CredentialStore;
use mail::MailSender;
use mail::gmail::{GmailApiClient, TokenManager};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 初始化日志
    init_logger()?;

    // 2. 加载配置
    let cfg = config::load().context("加载配置失败")?;
    if cfg.mail.is_placeholder() {
        tracing::warn!("⚠️ 未配置默认发件人，使用占位地址: {}", cfg.mail.default_from);
    }

    // 3. 加载 OAuth2 凭据并恢复 Token
    let store = CredentialStore::open(&cfg.storage.credentials_path, &cfg.storage.token_path)
        .context("加载 OAuth2 凭据失败")?;
    let tokens = Arc::new(TokenManager::new(store, &cfg.google)?);

    // 4. 组装发信器与路由
    let api = GmailApiClient::new(cfg.google.api_base.clone());
    let sender = MailSender::new(tokens, api, cfg.mail.default_from.clone());
    let app = server::router(server::AppState::new(sender));

    // 5. 启动服务
    server::serve((cfg.server.host.as_str(), cfg.server.port), app)
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("👋 服务已停止");
    Ok(())
}

fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gmail_mailer=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
