//! 测试辅助：临时 Token 文件与 Gmail mock
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::config::GoogleConfig;
use crate::config::oauth_config::OAuthCredentials;
use crate::config::storage::CredentialStore;
use crate::mail::gmail::{TokenManager, TokenSet};

pub fn credentials() -> OAuthCredentials {
    OAuthCredentials {
        client_id: "client-123.apps.googleusercontent.com".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://localhost:3000/oauth2callback".to_string(),
    }
}

/// token_url 指向 `{base}/token`
pub fn google_config(base: &str) -> GoogleConfig {
    GoogleConfig {
        token_url: format!("{}/token", base),
        api_base: base.to_string(),
        ..GoogleConfig::default()
    }
}

pub fn valid_token() -> TokenSet {
    TokenSet {
        access_token: "ya29.test-access-token".to_string(),
        refresh_token: Some("1//test-refresh".to_string()),
        scope: Some("https://www.googleapis.com/auth/gmail.send".to_string()),
        token_type: Some("Bearer".to_string()),
        expiry_date: TokenSet::expiry_from_now(chrono::Duration::hours(1)),
    }
}

/// 没有 Token 文件的管理器
pub fn unauthorized_manager() -> (Arc<TokenManager>, tempfile::TempDir) {
    manager_with("http://127.0.0.1:9", None)
}

/// 已授权且 Token 未过期的管理器
pub fn authorized_manager(base: &str) -> (Arc<TokenManager>, tempfile::TempDir) {
    manager_with(base, Some(valid_token()))
}

pub fn manager_with(base: &str, token: Option<TokenSet>) -> (Arc<TokenManager>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(credentials(), dir.path().join("token.json"));
    if let Some(token) = token {
        store.save_token(&token).expect("save token");
    }
    let manager = TokenManager::new(store, &google_config(base)).expect("token manager");
    (Arc::new(manager), dir)
}

/// `users.messages.send` 成功响应
pub fn gmail_send_mock(id: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "threadId": id,
            "labelIds": ["SENT"]
        })))
}
