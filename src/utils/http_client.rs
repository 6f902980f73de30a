//! 全局共享的 HTTP 客户端
//!
//! 复用连接池；所有 Gmail API 调用共用同一组超时设置，不做自动重试
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// 整体请求超时
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 连接建立超时
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 全局 HTTP 客户端实例（使用懒初始化）
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(300))
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(concat!("gmail-mailer/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("构建全局 HTTP 客户端失败")
});

/// 获取全局 HTTP 客户端
pub fn get_client() -> &'static Client {
    &HTTP_CLIENT
}
