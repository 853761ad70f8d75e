use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
};
use chrono::Utc;

use crate::app::dto::{LoginRequest, LoginResponse, UserView};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let outcome = services.login(&req.email, &req.password, ip, Utc::now()).await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_at: outcome.expires_at,
        user: UserView::from(&outcome.user),
    }))
}

/// First `X-Forwarded-For` hop, falling back to the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
