//! MIME 邮件构建与编码
//!
//! 生成 multipart/alternative（纯文本 + HTML）并编码为 Gmail API `raw` 字段要求的 base64url
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distributions::Alphanumeric};

/// 未提供纯文本正文时的占位文本
pub const DEFAULT_TEXT_BODY: &str = "This email contains HTML content.";

/// boundary 随机后缀长度
const BOUNDARY_SUFFIX_LEN: usize = 24;

/// 待发送的邮件（每次请求构建，不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: String,
}

/// base64url（无填充）编码后的 MIME 文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(String);

impl EncodedMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MimeError {
    #[error("header {header} contains a line break")]
    HeaderInjection { header: &'static str },
}

/// 生成 boundary：毫秒时间戳 + 随机字母数字后缀
pub fn generate_boundary() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("boundary_{}_{}", millis, suffix)
}

/// 构建并编码邮件
///
/// # Errors
/// - 邮件头的值包含换行（调用方校验后不应出现）
pub fn compose(msg: &MailMessage) -> Result<EncodedMessage, MimeError> {
    let document = render(msg, &generate_boundary())?;
    Ok(encode(&document))
}

/// 使用指定 boundary 渲染 MIME 文本
///
/// 行分隔符固定为 `\n`
pub fn render(msg: &MailMessage, boundary: &str) -> Result<String, MimeError> {
    let headers: [(&'static str, Option<&str>); 5] = [
        ("From", Some(msg.from.as_str())),
        ("To", Some(msg.to.as_str())),
        ("Cc", msg.cc.as_deref()),
        ("Bcc", msg.bcc.as_deref()),
        ("Subject", Some(msg.subject.as_str())),
    ];

    let mut lines: Vec<String> = Vec::with_capacity(20);

    for (name, value) in headers {
        let Some(value) = value else { continue };
        if value.contains(['\r', '\n']) {
            return Err(MimeError::HeaderInjection { header: name });
        }
        lines.push(format!("{}: {}", name, value));
    }

    let text = msg
        .text_body
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TEXT_BODY);

    lines.extend([
        "MIME-Version: 1.0".to_string(),
        format!("Content-Type: multipart/alternative; boundary={}", boundary),
        String::new(),
        format!("--{}", boundary),
        "Content-Type: text/plain; charset=utf-8".to_string(),
        String::new(),
        text.to_string(),
        String::new(),
        format!("--{}", boundary),
        "Content-Type: text/html; charset=utf-8".to_string(),
        String::new(),
        msg.html_body.clone(),
        String::new(),
        format!("--{}--", boundary),
    ]);

    Ok(lines.join("\n"))
}

/// base64 后 `+`→`-`、`/`→`_` 并去掉末尾 `=`，即无填充的 base64url
pub fn encode(document: &str) -> EncodedMessage {
    EncodedMessage(URL_SAFE_NO_PAD.encode(document.as_bytes()))
}
