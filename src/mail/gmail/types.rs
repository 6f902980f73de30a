//! Gmail 数据结构
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth2 用户 Token
///
/// 落盘格式与 Google 官方客户端库的 `token.json` 保持一致，
/// `expiry_date` 为毫秒级 Unix 时间戳
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Access Token 过期时间（UTC），未知时为 None
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// 计算过期时间，截断到毫秒以与落盘格式一致
    pub fn expiry_from_now(expires_in: chrono::Duration) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((Utc::now() + expires_in).timestamp_millis())
    }

    /// 检查 Token 是否即将过期
    ///
    /// # Arguments
    /// * `threshold_minutes` - 提前多少分钟算作"即将过期"
    ///
    /// 过期时间未知时视为未过期，交由 API 调用结果判断
    pub fn is_expiring(&self, threshold_minutes: i64) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry <= Utc::now() + chrono::Duration::minutes(threshold_minutes),
            None => false,
        }
    }

    /// 刷新响应通常不携带新的 Refresh Token，沿用旧值
    pub fn inherit_refresh_token(mut self, previous: &TokenSet) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        self
    }

    /// 日志用的脱敏 Access Token
    pub fn masked_access_token(&self) -> String {
        mask_secret(&self.access_token)
    }
}

/// 仅保留首尾各 5 个字符
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}

/// `users.messages.send` 请求体
#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub raw: &'a str,
}

/// `users.messages.send` 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// Gmail 分配的消息 ID
    pub id: String,

    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default)]
    pub label_ids: Vec<String>,
}

/// Google API 错误响应
///
/// `{"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}`
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
