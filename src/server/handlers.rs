//! 路由处理函数
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::mail::SendMailRequest;
use crate::mail::gmail::oauth::{FAILURE_MESSAGE, SUCCESS_MESSAGE};
use crate::server::AppState;
use crate::server::response::{SendMailFailure, SendMailSuccess};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

/// 存活检查，不依赖授权状态
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK",
        service: "Gmail API Mailer",
    })
}

/// 返回指向 Google 授权页的链接
pub async fn auth_link(State(state): State<AppState>) -> Html<String> {
    if state.tokens.is_authorized().await {
        tracing::info!("已有授权，重新授权将替换现有 Token");
    }

    let url = state.tokens.authorization_url();
    tracing::debug!("生成授权链接: {}", url);
    Html(format!("<a href=\"{}\">Authorize Gmail</a>", url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Google 授权回调
///
/// 成功时持久化 Token；任何失败都只返回 `OAuth failed`，细节写日志
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        tracing::warn!("⚠️ 用户拒绝授权或授权出错: {}", error);
        return oauth_failed();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("⚠️ 回调缺少授权码");
        return oauth_failed();
    };

    match state.tokens.exchange_code(&code).await {
        Ok(_) => {
            tracing::info!("✅ Gmail 授权完成");
            (StatusCode::OK, SUCCESS_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::error!("❌ OAuth 回调失败: {}", e);
            oauth_failed()
        }
    }
}

fn oauth_failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE).into_response()
}

/// 发送邮件
///
/// 请求体不是合法 JSON 时按校验错误处理
pub async fn send_mail(
    State(state): State<AppState>,
    payload: Result<Json<SendMailRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!("请求体解析失败: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(SendMailFailure::validation(rejection.body_text())),
            )
                .into_response();
        }
    };

    match state.sender.send(request).await {
        Ok(sent) => SendMailSuccess::new(sent.id).into_response(),
        Err(e) => e.into_response(),
    }
}
