use axum::{Json, http::StatusCode};

use crate::app::dto::UserView;
use crate::context::CurrentUser;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(user: CurrentUser) -> Json<UserView> {
    Json(UserView::from(&user))
}
