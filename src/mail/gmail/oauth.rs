//! Gmail OAuth2 授权码流程
//!
//! 生成授权 URL、用授权码交换 Token、用 Refresh Token 刷新
use anyhow::{Context, Result};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
};
use url::Url;

use crate::config::GoogleConfig;
use crate::config::oauth_config::OAuthCredentials;
use crate::mail::gmail::token::AuthError;
use crate::mail::gmail::types::TokenSet;

/// 授权成功页面
pub const SUCCESS_MESSAGE: &str = "✅ Gmail connected. You can now send emails.";

/// 授权失败页面
pub const FAILURE_MESSAGE: &str = "OAuth failed";

/// 授权 URL 中固定的 state，同一配置总是得到同一个 URL
const AUTH_STATE: &str = "gmail-mailer";

/// 未返回 expires_in 时的默认有效期（秒）
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Google OAuth2 客户端
pub struct GoogleOAuthClient {
    client: BasicClient,
    scopes: Vec<String>,
}

impl GoogleOAuthClient {
    /// 创建客户端
    ///
    /// # Errors
    /// - 配置中的端点或 redirect_uri 不是合法 URL
    pub fn new(credentials: &OAuthCredentials, google: &GoogleConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            AuthUrl::new(google.auth_url.clone()).context("授权端点 URL 无效")?,
            Some(TokenUrl::new(google.token_url.clone()).context("Token 端点 URL 无效")?),
        )
        .set_redirect_uri(
            RedirectUrl::new(credentials.redirect_uri.clone()).context("redirect_uri 无效")?,
        );

        Ok(Self {
            client,
            scopes: google.scopes.clone(),
        })
    }

    /// 生成授权 URL
    ///
    /// `access_type=offline` + `prompt=consent` 保证 Google 返回 Refresh Token
    pub fn authorization_url(&self) -> Url {
        let (url, _state) = self
            .client
            .authorize_url(|| CsrfToken::new(AUTH_STATE.to_string()))
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        url
    }

    /// 交换授权码为 Token
    ///
    /// # Errors
    /// - 授权码无效或已过期
    /// - 网络错误
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        tracing::debug!("开始交换 Token");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                let message = describe_token_error(e);
                tracing::error!("❌ Token 交换失败: {}", message);
                AuthError::Exchange(message)
            })?;

        let token = token_set_from_response(&response);

        if token.refresh_token.is_none() {
            tracing::warn!("⚠️ 未收到 refresh_token，Access Token 过期后需要重新授权");
        }

        Ok(token)
    }

    /// 使用 Refresh Token 交换新的 Access Token
    ///
    /// 返回的 TokenSet 可能不含 Refresh Token，调用方负责沿用旧值
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        tracing::debug!("开始刷新 Access Token");

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                let message = describe_token_error(e);

                if message.contains("invalid_grant") {
                    tracing::error!("❌ Token 刷新失败 [授权被拒绝/已过期]: {}", message);
                    tracing::error!(
                        "   💡 可能原因:\n   \
                         - Refresh Token 已过期或被撤销\n   \
                         - 用户撤销了应用授权\n   \
                         - 需要重新访问 /auth 授权"
                    );
                } else {
                    tracing::error!("❌ Token 刷新失败: {}", message);
                }

                AuthError::Exchange(message)
            })?;

        Ok(token_set_from_response(&response))
    }
}

fn token_set_from_response(response: &BasicTokenResponse) -> TokenSet {
    let expires_in = response
        .expires_in()
        .unwrap_or(std::time::Duration::from_secs(DEFAULT_EXPIRES_IN_SECS));

    let expiry_date = chrono::Duration::from_std(expires_in)
        .ok()
        .and_then(TokenSet::expiry_from_now);

    let scope = response.scopes().map(|scopes| {
        scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });

    TokenSet {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
        scope,
        token_type: Some("Bearer".to_string()),
        expiry_date,
    }
}

/// 服务端错误（如 invalid_grant）的 Display 只有一句概括，单独展开
fn describe_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/oauth2callback".to_string(),
        }
    }

    fn google_config(token_url: String) -> GoogleConfig {
        GoogleConfig {
            token_url,
            ..GoogleConfig::default()
        }
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let client = GoogleOAuthClient::new(&credentials(), &GoogleConfig::default()).unwrap();

        let first = client.authorization_url();
        let second = client.authorization_url();
        assert_eq!(first, second);

        assert!(first.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));

        let params: std::collections::HashMap<_, _> = first.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/gmail.send");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/oauth2callback");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["state"], AUTH_STATE);
    }

    #[test]
    fn test_invalid_redirect_uri() {
        let mut creds = credentials();
        creds.redirect_uri = "not a url".to_string();
        assert!(GoogleOAuthClient::new(&creds, &GoogleConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new-access-token",
                "refresh_token": "1//new-refresh",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/gmail.send",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            GoogleOAuthClient::new(&credentials(), &google_config(format!("{}/token", server.uri())))
                .unwrap();

        let token = client.exchange_code("auth-code").await.unwrap();
        assert_eq!(token.access_token, "ya29.new-access-token");
        assert_eq!(token.refresh_token.as_deref(), Some("1//new-refresh"));
        assert_eq!(
            token.scope.as_deref(),
            Some("https://www.googleapis.com/auth/gmail.send")
        );
        assert!(!token.is_expiring(30));
        assert!(token.is_expiring(61));
    }

    #[tokio::test]
    async fn test_exchange_code_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let client =
            GoogleOAuthClient::new(&credentials(), &google_config(format!("{}/token", server.uri())))
                .unwrap();

        let err = client.exchange_code("expired-code").await.unwrap_err();
        match err {
            AuthError::Exchange(message) => assert!(message.contains("invalid_grant")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_new_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            GoogleOAuthClient::new(&credentials(), &google_config(format!("{}/token", server.uri())))
                .unwrap();

        let token = client.refresh("1//old-refresh").await.unwrap();
        assert_eq!(token.access_token, "ya29.refreshed");
        assert!(token.refresh_token.is_none());
    }
}
