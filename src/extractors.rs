use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner of the request, taken from `x-owner-id`. Authentication happens
/// upstream; this service trusts the gateway's header.
#[derive(Debug, Clone, Copy)]
pub struct OwnerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, format!("missing {OWNER_HEADER} header")))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid {OWNER_HEADER} header")))?;

        Ok(OwnerId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<OwnerId, (StatusCode, String)> {
        let mut builder = Request::builder().uri("/api/v1/meals");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        OwnerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_owner_header() {
        let id = Uuid::new_v4();
        let OwnerId(got) = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(got, id);
    }

    #[tokio::test]
    async fn rejects_missing_or_garbled_header() {
        assert_eq!(extract(None).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
        assert_eq!(extract(Some("nope")).await.unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
