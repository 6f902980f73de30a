//! Gmail 模块 - OAuth2 授权与发送接口
pub mod api;
pub mod oauth;
pub mod token;
pub mod types;

// 重新导出常用类型
pub use api::{ApiError, GmailApiClient};
pub use token::{AuthError, TokenManager};
pub use types::{SentMessage, TokenSet};
