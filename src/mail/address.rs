//! 收件人地址校验与规范化
//!
//! 校验规则刻意保持宽松（`local@domain.tld` 形状），并不完整实现 RFC 5322
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// `local@domain.tld`，各段不含空白和 `@`
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("邮箱正则无效"));

/// `Display Name <addr>` 中尖括号内的地址
static ANGLE_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^>]+)>").expect("尖括号正则无效"));

/// 地址输入：逗号分隔的字符串，或字符串数组
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for AddressInput {
    fn from(value: &str) -> Self {
        AddressInput::One(value.to_string())
    }
}

impl From<Vec<String>> for AddressInput {
    fn from(value: Vec<String>) -> Self {
        AddressInput::Many(value)
    }
}

impl AddressInput {
    /// 拆分并去除首尾空白
    fn entries(&self) -> Vec<&str> {
        match self {
            AddressInput::One(s) => s.split(',').map(str::trim).collect(),
            AddressInput::Many(list) => list.iter().map(|s| s.trim()).collect(),
        }
    }

    /// 空字符串、空数组视为未提供
    pub fn is_empty(&self) -> bool {
        match self {
            AddressInput::One(s) => s.trim().is_empty(),
            AddressInput::Many(list) => list.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid email address: {entry}")]
    Invalid { entry: String },
}

/// 规范化地址列表
///
/// # Returns
/// - `Ok(None)`：未提供（不生成对应的邮件头）
/// - `Ok(Some(..))`：以 `", "` 连接的地址，顺序与显示名保持原样
///
/// # Errors
/// 遇到第一个无效地址即失败，不返回部分结果
pub fn normalize(value: Option<&AddressInput>) -> Result<Option<String>, AddressError> {
    let Some(input) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let entries = input.entries();

    for entry in &entries {
        if !is_valid_entry(entry) {
            return Err(AddressError::Invalid {
                entry: entry.to_string(),
            });
        }
    }

    Ok(Some(entries.join(", ")))
}

/// 提取地址部分：有尖括号时取括号内，否则取整个条目
pub fn address_part(entry: &str) -> &str {
    ANGLE_ADDR_RE
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(entry)
}

/// 显示名里的换行会变成额外的邮件头，整条拒绝
fn is_valid_entry(entry: &str) -> bool {
    !entry.contains(['\r', '\n']) && EMAIL_RE.is_match(address_part(entry))
}
