//! 发信编排
//!
//! 每个请求依次经过 Validating -> Composing -> Authorizing -> Sending，
//! 任一阶段失败直接结束，不做自动重试
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::mail::address::{self, AddressError, AddressInput};
use crate::mail::gmail::{AuthError, GmailApiClient, SentMessage, TokenManager};
use crate::mail::mime::{self, MailMessage, MimeError};

/// 缺少必填字段时的提示
pub const REQUIRED_FIELDS_MESSAGE: &str = "Required fields: to, subject, html";

/// `POST /send-mail` 请求体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMailRequest {
    pub from: Option<String>,
    pub to: Option<AddressInput>,
    pub cc: Option<AddressInput>,
    pub bcc: Option<AddressInput>,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

/// 发信阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    Validating,
    Composing,
    Authorizing,
    Sending,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendStage::Validating => "validating",
            SendStage::Composing => "composing",
            SendStage::Authorizing => "authorizing",
            SendStage::Sending => "sending",
        };
        f.write_str(name)
    }
}

/// 发信失败
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// 请求字段缺失或地址无效（客户端错误）
    #[error("{0}")]
    Validation(String),

    /// 未授权或 Token 刷新失败，需要重新授权
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Gmail 拒绝或不可达，原样返回提供方的描述
    #[error("{provider_message}")]
    Delivery { provider_message: String },

    /// 校验通过后构建 MIME 失败，不应出现
    #[error("Internal error while composing the message")]
    Internal(#[source] MimeError),
}

impl From<AddressError> for SendError {
    fn from(err: AddressError) -> Self {
        SendError::Validation(err.to_string())
    }
}

impl SendError {
    /// 失败发生的阶段
    pub fn stage(&self) -> SendStage {
        match self {
            SendError::Validation(_) => SendStage::Validating,
            SendError::Internal(_) => SendStage::Composing,
            SendError::Auth(_) => SendStage::Authorizing,
            SendError::Delivery { .. } => SendStage::Sending,
        }
    }
}

/// 发信器
///
/// 持有 TokenManager 的共享引用，除 Token 外不修改任何状态
pub struct MailSender {
    tokens: Arc<TokenManager>,
    api: GmailApiClient,
    default_from: String,
}

impl MailSender {
    pub fn new(tokens: Arc<TokenManager>, api: GmailApiClient, default_from: impl Into<String>) -> Self {
        Self {
            tokens,
            api,
            default_from: default_from.into(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// 发送一封邮件
    ///
    /// # Returns
    /// Gmail 分配的消息信息
    ///
    /// # Errors
    /// 见 [`SendError`]，每个变体对应一个失败阶段
    pub async fn send(&self, request: SendMailRequest) -> Result<SentMessage, SendError> {
        let result = self.run(request).await;

        match &result {
            Ok(sent) => tracing::info!("📧 邮件发送成功: id={}", sent.id),
            Err(e @ SendError::Validation(_)) => {
                tracing::warn!("发信失败 [{}]: {}", e.stage(), e);
            }
            Err(e) => tracing::error!("❌ 发信失败 [{}]: {:?}", e.stage(), e),
        }

        result
    }

    async fn run(&self, request: SendMailRequest) -> Result<SentMessage, SendError> {
        tracing::debug!("[{}] 校验请求", SendStage::Validating);
        let message = self.validate(request)?;

        tracing::debug!("[{}] 构建 MIME: to={}", SendStage::Composing, message.to);
        let encoded = mime::compose(&message).map_err(SendError::Internal)?;

        tracing::debug!("[{}] 获取 Access Token", SendStage::Authorizing);
        let token = self.tokens.current_credentials().await?;

        tracing::debug!("[{}] 调用 Gmail API", SendStage::Sending);
        self.api
            .send_message(&token.access_token, encoded.as_str())
            .await
            .map_err(|e| SendError::Delivery {
                provider_message: e.provider_message(),
            })
    }

    /// 校验请求并规范化地址
    ///
    /// 不产生任何网络调用
    pub fn validate(&self, request: SendMailRequest) -> Result<MailMessage, SendError> {
        let SendMailRequest {
            from,
            to,
            cc,
            bcc,
            subject,
            html,
            text,
        } = request;

        let to = to.filter(|t| !t.is_empty());
        let subject = subject.filter(|s| !s.is_empty());
        let html = html.filter(|h| !h.is_empty());

        let (Some(to), Some(subject), Some(html_body)) = (to, subject, html) else {
            return Err(SendError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()));
        };

        let from = from
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.default_from.clone());

        if has_line_break(&from) || has_line_break(&subject) {
            return Err(SendError::Validation(
                "Header fields must not contain line breaks".to_string(),
            ));
        }

        let to = address::normalize(Some(&to))?
            .ok_or_else(|| SendError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()))?;
        let cc = address::normalize(cc.as_ref())?;
        let bcc = address::normalize(bcc.as_ref())?;

        Ok(MailMessage {
            from,
            to,
            cc,
            bcc,
            subject,
            text_body: text,
            html_body,
        })
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}
