//! Gmail API 调用模块
//!
//! 只用到 `users.messages.send`
use crate::mail::gmail::types::{GoogleErrorBody, GoogleErrorResponse, SendMessageRequest, SentMessage};
use crate::utils::http_client;

/// Gmail API 错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 网络不可达、超时等
    #[error("Gmail API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Gmail 返回了非 2xx 响应
    #[error("{message}")]
    Provider { message: String },
}

impl ApiError {
    /// 原样返回给调用方的错误描述
    pub fn provider_message(&self) -> String {
        match self {
            ApiError::Transport(e) => e.to_string(),
            ApiError::Provider { message } => message.clone(),
        }
    }
}

/// Gmail API 客户端
#[derive(Debug, Clone)]
pub struct GmailApiClient {
    base_url: String,
}

impl GmailApiClient {
    /// 创建新的 Gmail API 客户端
    ///
    /// # Arguments
    /// * `base_url` - API 根地址，如 `https://gmail.googleapis.com`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 发送已编码的邮件
    ///
    /// # Arguments
    /// * `access_token` - 有效的 Access Token
    /// * `raw` - base64url 编码的 MIME 文档
    ///
    /// # Returns
    /// Gmail 分配的消息信息
    pub async fn send_message(&self, access_token: &str, raw: &str) -> Result<SentMessage, ApiError> {
        let url = format!("{}/gmail/v1/users/me/messages/send", self.base_url);

        tracing::debug!("正在调用 Gmail 发送接口（raw 长度: {}）", raw.len());

        let response = http_client::get_client()
            .post(&url)
            .bearer_auth(access_token)
            .json(&SendMessageRequest { raw })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status == 401 {
                tracing::warn!("Gmail 拒绝了 Access Token（401），可能需要重新授权");
            }

            let message = match provider_error(&body) {
                Some(error) => {
                    tracing::error!(
                        "❌ Gmail API 返回错误 {} [{} {}]: {}",
                        status,
                        error.code,
                        error.status.as_deref().unwrap_or("-"),
                        error.message
                    );
                    error.message
                }
                None => {
                    tracing::error!("❌ Gmail API 返回错误 {}: {}", status, body);
                    format!("Gmail API returned {}", status)
                }
            };

            return Err(ApiError::Provider { message });
        }

        let sent: SentMessage = response.json().await?;

        tracing::info!("✅ Gmail 已接受邮件: id={}", sent.id);

        Ok(sent)
    }
}

/// 解析 Google 错误响应，`error.message` 为空时视为无法识别
fn provider_error(body: &str) -> Option<GoogleErrorBody> {
    serde_json::from_str::<GoogleErrorResponse>(body)
        .ok()
        .map(|e| e.error)
        .filter(|e| !e.message.is_empty())
}
