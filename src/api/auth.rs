//! Authentication API handlers

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use validator::Validate;

use crate::api::SuccessResponse;
use crate::error::Result;
use crate::middleware::Actor;
use crate::server::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Exchange credentials for an access token
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let response = state.auth.login(&input.email, &input.password).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Return the authenticated account
pub async fn me(actor: Actor) -> impl IntoResponse {
    Json(SuccessResponse::new(actor.account))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_rejects_bad_email() {
        let request = LoginRequest {
            email: "not-an-email".to_string(),
            password: "secret".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_login_request_rejects_empty_password() {
        let request = LoginRequest {
            email: "user@example.com".to_string(),
            password: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
