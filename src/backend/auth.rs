//! Bearer-token authentication for protected routes.

use super::identity::{DecodedToken, IdentityProvider};
use crate::dispatch::ApiRequest;
use crate::error::ApiError;

/// Verify the request's bearer token. Any failure is `Unauthorized`.
pub async fn authenticate_request(
    request: &ApiRequest,
    identity: &dyn IdentityProvider,
) -> Result<DecodedToken, ApiError> {
    let token = request.bearer_token().ok_or(ApiError::Unauthorized)?;
    identity.verify_id_token(token).await.map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        ApiError::Unauthorized
    })
}
