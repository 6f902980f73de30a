//! Token 管理模块
//!
//! 进程内唯一的 TokenSet 放在读写锁后面，
//! 更新时先落盘再替换内存值，读者只会看到完整的新值或旧值
use anyhow::Result;
use tokio::sync::RwLock;
use url::Url;

use crate::config::GoogleConfig;
use crate::config::storage::CredentialStore;
use crate::mail::gmail::oauth::GoogleOAuthClient;
use crate::mail::gmail::types::TokenSet;

/// Token 刷新阈值（提前多少分钟刷新）
const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// 授权相关错误
///
/// 均需要重新走一遍 `/auth` 授权流程，不会自动重试
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Gmail is not authorized yet, open /auth to connect the mailbox")]
    NotAuthorized,

    #[error("Gmail access token expired and no refresh token is stored, open /auth to re-authorize")]
    Expired,

    #[error("OAuth token exchange failed: {0}")]
    Exchange(String),

    #[error("Failed to persist OAuth token: {0}")]
    Storage(String),
}

/// Token 管理器
pub struct TokenManager {
    store: CredentialStore,
    oauth: GoogleOAuthClient,
    current: RwLock<Option<TokenSet>>,
}

impl TokenManager {
    /// 创建 Token 管理器，并恢复之前保存的授权
    ///
    /// # Errors
    /// - OAuth2 端点配置无效
    pub fn new(store: CredentialStore, google: &GoogleConfig) -> Result<Self> {
        let oauth = GoogleOAuthClient::new(store.credentials(), google)?;

        let current = match store.load_token() {
            Ok(Some(token)) => {
                tracing::info!("✅ 已恢复之前的授权（Token 文件: {}）", store.token_path().display());
                Some(token)
            }
            Ok(None) => {
                tracing::warn!("📭 尚未授权，请访问 /auth 连接 Gmail");
                None
            }
            Err(e) => {
                tracing::warn!("⚠️ 加载 Token 失败: {:#}，需要重新授权", e);
                None
            }
        };

        Ok(Self {
            store,
            oauth,
            current: RwLock::new(current),
        })
    }

    /// 授权 URL（无副作用）
    pub fn authorization_url(&self) -> Url {
        self.oauth.authorization_url()
    }

    pub async fn is_authorized(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// 用授权码交换 Token，持久化后替换当前 Token
    ///
    /// # Errors
    /// - `AuthError::Exchange`：授权码无效或已过期
    /// - `AuthError::Storage`：写入 Token 文件失败，内存中的 Token 保持不变
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let token = self.oauth.exchange_code(code).await?;

        self.replace(token.clone()).await?;

        tracing::info!("✅ Token 交换成功: {}", token.masked_access_token());

        Ok(token)
    }

    /// 获取下一次 API 调用可用的 Token
    ///
    /// 即将过期（默认提前 5 分钟）时用 Refresh Token 刷新并持久化
    ///
    /// # Errors
    /// - `AuthError::NotAuthorized`：从未授权
    /// - `AuthError::Expired`：已过期且没有 Refresh Token
    /// - `AuthError::Exchange`：刷新失败
    /// - `AuthError::Storage`：刷新成功但写入失败
    pub async fn current_credentials(&self) -> Result<TokenSet, AuthError> {
        {
            let guard = self.current.read().await;
            match guard.as_ref() {
                None => return Err(AuthError::NotAuthorized),
                Some(token) if !token.is_expiring(REFRESH_THRESHOLD_MINUTES) => {
                    return Ok(token.clone());
                }
                Some(_) => {}
            }
        }

        let mut guard = self.current.write().await;

        // 等待写锁期间其他请求可能已经刷新过
        let token = guard.as_ref().ok_or(AuthError::NotAuthorized)?.clone();
        if !token.is_expiring(REFRESH_THRESHOLD_MINUTES) {
            return Ok(token);
        }

        tracing::info!("Access Token 即将过期（{:?}），自动刷新", token.expiry_date);

        let refresh_token = token.refresh_token.clone().ok_or(AuthError::Expired)?;
        let refreshed = self
            .oauth
            .refresh(&refresh_token)
            .await?
            .inherit_refresh_token(&token);

        self.persist(&refreshed)?;
        *guard = Some(refreshed.clone());

        tracing::info!(
            "✅ Access Token 刷新成功（新的过期时间: {:?}）",
            refreshed.expiry_date
        );

        Ok(refreshed)
    }

    /// 持久化并替换当前 Token
    ///
    /// 写锁覆盖落盘和赋值，磁盘上的文件总是最新的内存值
    pub(crate) async fn replace(&self, token: TokenSet) -> Result<(), AuthError> {
        let mut guard = self.current.write().await;
        self.persist(&token)?;
        *guard = Some(token);
        Ok(())
    }

    fn persist(&self, token: &TokenSet) -> Result<(), AuthError> {
        self.store.save_token(token).map_err(|e| {
            tracing::error!("❌ 保存 Token 失败: {:#}", e);
            AuthError::Storage(format!("{:#}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::oauth_config::OAuthCredentials;
    use std::path::Path;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_refresh_threshold() {
        assert_eq!(REFRESH_THRESHOLD_MINUTES, 5);
    }

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/oauth2callback".to_string(),
        }
    }

    fn manager(token_path: &Path, token_url: Option<String>) -> TokenManager {
        let mut google = GoogleConfig::default();
        if let Some(url) = token_url {
            google.token_url = url;
        }
        let store = CredentialStore::new(credentials(), token_path.to_path_buf());
        TokenManager::new(store, &google).unwrap()
    }

    fn token(access: &str, refresh: Option<&str>, expires_in_minutes: i64) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            scope: None,
            token_type: Some("Bearer".to_string()),
            expiry_date: TokenSet::expiry_from_now(chrono::Duration::minutes(expires_in_minutes)),
        }
    }

    #[tokio::test]
    async fn test_not_authorized() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir.path().join("token.json"), None);

        assert!(!manager.is_authorized().await);
        assert!(matches!(
            manager.current_credentials().await,
            Err(AuthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_restores_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");

        let saved = token("ya29.persisted", Some("1//r"), 60);
        CredentialStore::new(credentials(), token_path.clone())
            .save_token(&saved)
            .unwrap();

        let manager = manager(&token_path, None);
        assert!(manager.is_authorized().await);
        assert_eq!(manager.current_credentials().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_corrupt_token_file_starts_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, "garbage").unwrap();

        let manager = manager(&token_path, None);
        assert!(!manager.is_authorized().await);
    }

    #[tokio::test]
    async fn test_exchange_code_persists_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.exchanged",
                "refresh_token": "1//exchanged",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let manager = manager(&token_path, Some(format!("{}/token", server.uri())));

        let token = manager.exchange_code("code").await.unwrap();
        assert_eq!(token.access_token, "ya29.exchanged");
        assert_eq!(manager.current_credentials().await.unwrap(), token);

        // 重启后仍然可用
        let restarted = self::manager(&token_path, None);
        assert_eq!(
            restarted.current_credentials().await.unwrap().access_token,
            "ya29.exchanged"
        );
    }

    #[tokio::test]
    async fn test_failed_exchange_keeps_previous_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager(
            &dir.path().join("token.json"),
            Some(format!("{}/token", server.uri())),
        );
        let existing = token("ya29.existing", Some("1//r"), 60);
        manager.replace(existing.clone()).await.unwrap();

        assert!(matches!(
            manager.exchange_code("bad").await,
            Err(AuthError::Exchange(_))
        ));
        assert_eq!(manager.current_credentials().await.unwrap(), existing);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_commit() {
        let dir = tempfile::tempdir().unwrap();
        // 目标路径是一个目录，rename 会失败
        let token_path = dir.path().join("token.json");
        std::fs::create_dir_all(token_path.join("occupied")).unwrap();

        let manager = manager(&token_path, None);
        let result = manager.replace(token("ya29.new", None, 60)).await;

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert!(!manager.is_authorized().await);
    }

    #[tokio::test]
    async fn test_refreshes_expiring_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=1%2F%2Fstored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let manager = manager(&token_path, Some(format!("{}/token", server.uri())));
        manager
            .replace(token("ya29.stale", Some("1//stored"), 1))
            .await
            .unwrap();

        let current = manager.current_credentials().await.unwrap();
        assert_eq!(current.access_token, "ya29.refreshed");
        assert_eq!(current.refresh_token.as_deref(), Some("1//stored"));

        // 刷新结果已落盘
        let on_disk = CredentialStore::new(credentials(), token_path)
            .load_token()
            .unwrap()
            .unwrap();
        assert_eq!(on_disk, current);

        // 第二次调用不再刷新（expect(1)）
        assert_eq!(manager.current_credentials().await.unwrap(), current);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager(
            &dir.path().join("token.json"),
            Some(format!("{}/token", server.uri())),
        );
        manager
            .replace(token("ya29.stale", Some("1//revoked"), -10))
            .await
            .unwrap();

        assert!(matches!(
            manager.current_credentials().await,
            Err(AuthError::Exchange(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir.path().join("token.json"), None);
        manager
            .replace(token("ya29.stale", None, -10))
            .await
            .unwrap();

        assert!(matches!(
            manager.current_credentials().await,
            Err(AuthError::Expired)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_never_see_torn_token() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(manager(&dir.path().join("token.json"), None));
        manager
            .replace(token("access-0", Some("refresh-0"), 60))
            .await
            .unwrap();

        let writer = {
            let manager = manager.clone();
            tokio::spawn(async move {
                for i in 1..=50 {
                    let t = token(&format!("access-{i}"), Some(format!("refresh-{i}").as_str()), 60);
                    manager.replace(t).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let mut last = 0u32;
                    for _ in 0..200 {
                        let t = manager.current_credentials().await.unwrap();
                        let access: u32 = t.access_token.trim_start_matches("access-").parse().unwrap();
                        let refresh: u32 = t
                            .refresh_token
                            .unwrap()
                            .trim_start_matches("refresh-")
                            .parse()
                            .unwrap();
                        assert_eq!(access, refresh, "torn token observed");
                        assert!(access >= last, "token went backwards");
                        last = access;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        // 磁盘上是最后一次写入的值
        let on_disk = CredentialStore::new(credentials(), dir.path().join("token.json"))
            .load_token()
            .unwrap()
            .unwrap();
        assert_eq!(on_disk.access_token, "access-50");
    }
}
