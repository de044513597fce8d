//! Current user handler.

use crate::auth::claims::numeric_date;
use crate::auth::VerifiedIdentity;
use crate::models::MeResponse;
use axum::{Extension, Json};

/// Handler for GET /api/v1/me
///
/// Returns the identity resolved by the auth middleware.
#[tracing::instrument(skip_all, name = "api.handlers.me")]
pub async fn get_me(Extension(identity): Extension<VerifiedIdentity>) -> Json<MeResponse> {
    Json(me_response(&identity))
}

fn me_response(identity: &VerifiedIdentity) -> MeResponse {
    let claims = &identity.claims;

    MeResponse {
        user_id: identity.user_id,
        token_use: claims.token_use.clone(),
        email: claims.email.clone(),
        display_name: claims.display_name(),
        provider: claims.provider_name().to_string(),
        expires_at: claims.exp.and_then(numeric_date),
    }
}
