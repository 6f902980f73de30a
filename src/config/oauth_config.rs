//! OAuth2 客户端凭据读取模块
//!
//! 支持从环境变量或 Google 下载的 client secret JSON 文件读取
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OAuth2 客户端凭据（进程生命周期内不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    /// 授权回调地址（指向本服务的 `/oauth2callback`）
    pub redirect_uri: String,
}

/// Google Cloud Console 导出的凭据文件
///
/// 桌面应用为 `installed`，Web 应用为 `web`
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretEntry>,
    web: Option<ClientSecretEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl OAuthCredentials {
    /// 加载 OAuth2 凭据
    ///
    /// 优先级（从高到低）：
    /// 1. 环境变量：`GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`（可选 `OAUTH_REDIRECT_URI`）
    /// 2. 凭据文件
    ///
    /// # Errors
    /// - 文件不存在或格式错误
    /// - 文件中既没有 `installed` 也没有 `web` 段
    /// - 没有可用的 redirect_uri
    pub fn load(path: &Path) -> Result<Self> {
        if let (Ok(client_id), Ok(client_secret)) = (
            std::env::var("GMAIL_CLIENT_ID"),
            std::env::var("GMAIL_CLIENT_SECRET"),
        ) {
            tracing::info!("✅ 从环境变量加载 OAuth2 凭据");

            let redirect_uri = match std::env::var("OAUTH_REDIRECT_URI") {
                Ok(uri) => uri,
                Err(_) => Self::load_from_file(path)
                    .map(|c| c.redirect_uri)
                    .context("未设置 OAUTH_REDIRECT_URI，且无法从凭据文件读取 redirect_uri")?,
            };

            return Ok(Self {
                client_id,
                client_secret,
                redirect_uri,
            });
        }

        let credentials = Self::load_from_file(path)?;
        tracing::info!("✅ 从凭据文件加载 OAuth2 凭据: {}", path.display());
        Ok(credentials)
    }

    /// 从凭据文件加载
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取凭据文件失败: {}", path.display()))?;
        Self::from_json(&content)
    }

    /// 解析 client secret JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientSecretFile =
            serde_json::from_str(content).context("解析凭据文件失败")?;

        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| anyhow::anyhow!("凭据文件缺少 installed 或 web 段"))?;

        let redirect_uri = entry
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("凭据文件缺少 redirect_uris"))?;

        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            redirect_uri,
        })
    }

    /// 验证凭据是否为占位符
    pub fn is_placeholder(&self) -> bool {
        self.client_id.is_empty()
            || self.client_secret.is_empty()
            || self.client_id.contains("YOUR_CLIENT_ID")
            || self.client_secret.contains("YOUR_CLIENT_SECRET")
    }
}
