use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's hierarchy level id
pub const HIERARCHY_LEVEL_HEADER: &str = "x-hierarchy-level-id";

/// Caller identity. Token validation happens upstream; by the time a request
/// reaches this service both ids have been verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub hierarchy_level_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            user_id: uuid_header(&parts.headers, USER_ID_HEADER)?,
            hierarchy_level_id: uuid_header(&parts.headers, HIERARCHY_LEVEL_HEADER)?,
        })
    }
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    let value = headers
        .get(name)
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))?;

    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized(format!("Invalid {} header format", name)))?;

    Uuid::parse_str(value.trim()).map_err(|_| ApiError::unauthorized(format!("{} must be a UUID", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_uuid_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(uuid_header(&headers, USER_ID_HEADER).unwrap(), id);
    }

    #[test]
    fn rejects_missing_and_malformed() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            uuid_header(&headers, USER_ID_HEADER),
            Err(ApiError::Unauthorized(_))
        ));
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            uuid_header(&headers, USER_ID_HEADER),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
