//! 凭据与 Token 文件存储模块
//!
//! 本服务唯一拥有的持久化状态就是 Token 文件
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::oauth_config::OAuthCredentials;
use crate::mail::gmail::types::TokenSet;

/// 凭据存储
///
/// 持有启动时加载的 OAuth2 客户端凭据，以及 Token 文件的读写
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: OAuthCredentials,
    token_path: PathBuf,
}

impl CredentialStore {
    /// 加载客户端凭据
    ///
    /// # Errors
    /// - 凭据文件缺失或格式错误（Token 文件缺失不是错误）
    pub fn open(credentials_path: &Path, token_path: &Path) -> Result<Self> {
        let credentials = OAuthCredentials::load(credentials_path)?;

        if credentials.is_placeholder() {
            tracing::warn!("⚠️ OAuth2 凭据看起来是占位符，授权流程将会失败");
        }

        Ok(Self::new(credentials, token_path.to_path_buf()))
    }

    pub fn new(credentials: OAuthCredentials, token_path: PathBuf) -> Self {
        Self {
            credentials,
            token_path,
        }
    }

    pub fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// 加载已保存的 Token
    ///
    /// # Returns
    /// 文件不存在时返回 None（尚未授权）
    ///
    /// # Errors
    /// - 文件存在但无法读取或解析
    pub fn load_token(&self) -> Result<Option<TokenSet>> {
        let path = &self.token_path;

        if !path.exists() {
            tracing::debug!("Token 文件不存在，尚未授权: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取 Token 文件失败: {}", path.display()))?;

        let token: TokenSet = serde_json::from_str(&content)
            .with_context(|| format!("解析 Token 文件失败（文件可能损坏）: {}", path.display()))?;

        tracing::debug!("成功加载 Token: {}", token.masked_access_token());

        Ok(Some(token))
    }

    /// 保存 Token（覆盖式）
    ///
    /// 先写同目录临时文件再重命名，读者不会看到写了一半的文件
    pub fn save_token(&self, token: &TokenSet) -> Result<()> {
        let path = &self.token_path;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("创建 Token 目录失败: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(token).context("序列化 Token 失败")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("写入 Token 临时文件失败: {}", tmp_path.display()))?;
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e).with_context(|| format!("替换 Token 文件失败: {}", path.display()));
        }

        tracing::debug!("Token 已保存到: {}", path.display());

        Ok(())
    }
}
