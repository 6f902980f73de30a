//! 进程配置
//!
//! 优先级（从高到低）：环境变量 > 配置文件 > 默认值
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod oauth_config;
pub mod storage;

/// 默认发件人（未在请求中提供 `from` 时使用）
pub const DEFAULT_FROM_PLACEHOLDER: &str = "\"Gmail API Mailer\" <mailer@example.com>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 持久化文件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// OAuth2 客户端凭据（Google 下载的 client secret JSON）
    pub credentials_path: PathBuf,

    /// 用户 Token 文件（授权回调成功后写入）
    pub token_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub default_from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            default_from: DEFAULT_FROM_PLACEHOLDER.to_string(),
        }
    }
}

impl MailConfig {
    pub fn is_placeholder(&self) -> bool {
        self.default_from == DEFAULT_FROM_PLACEHOLDER
    }
}

/// Google 端点与权限范围
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub auth_url: String,
    pub token_url: String,

    /// Gmail REST API 根地址（测试时指向 mock 服务器）
    pub api_base: String,

    pub scopes: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://gmail.googleapis.com".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.send".to_string()],
        }
    }
}

/// 获取默认配置文件路径
///
/// 返回：`<config_dir>/GmailMailer/config.toml`
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?
        .join("GmailMailer");

    Ok(config_dir.join("config.toml"))
}

/// 加载配置
///
/// 1. `MAILER_CONFIG` 指定的文件，否则默认配置文件（不存在则使用默认值）
/// 2. 环境变量覆盖单个字段
pub fn load() -> Result<Config> {
    let path = match std::env::var("MAILER_CONFIG") {
        Ok(p) => PathBuf::from(p),
        Err(_) => config_path()?,
    };

    let mut config = if path.exists() {
        tracing::info!("从配置文件加载: {}", path.display());
        load_from_file(&path)?
    } else {
        tracing::debug!("配置文件不存在，使用默认配置: {}", path.display());
        Config::default()
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// 从 TOML 文件加载
pub fn load_from_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
    Ok(config)
}

/// 用环境变量覆盖配置
///
/// `lookup` 抽象了环境变量读取，便于测试
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("MAILER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("MAILER_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("MAILER_PORT 不是有效端口: {}", port))?;
    }
    if let Some(path) = lookup("MAILER_CREDENTIALS_PATH") {
        config.storage.credentials_path = PathBuf::from(path);
    }
    if let Some(path) = lookup("MAILER_TOKEN_PATH") {
        config.storage.token_path = PathBuf::from(path);
    }
    if let Some(from) = lookup("MAILER_DEFAULT_FROM") {
        config.mail.default_from = from;
    }
    Ok(())
}
