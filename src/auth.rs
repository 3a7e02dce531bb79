//! Bearer-token authentication. Accounts are provisioned out of band (the
//! seed file); the directory only maps opaque tokens to callers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use dashmap::DashMap;
use ulid::Ulid;

use crate::booking::Caller;
use crate::http::ApiError;
use crate::model::Role;

#[derive(Debug, Default)]
pub struct TokenDirectory {
    tokens: DashMap<String, Caller>,
}

impl TokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, id: Ulid, role: Role) {
        self.tokens.insert(token.into(), Caller { id, role });
    }

    pub fn resolve(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Arc<TokenDirectory>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let directory = Arc::<TokenDirectory>::from_ref(state);
        bearer(parts)
            .and_then(|token| directory.resolve(token))
            .ok_or_else(ApiError::unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/bookings");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer(&parts(Some("bearer  abc123 "))), Some("abc123"));
        assert_eq!(bearer(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer(&parts(Some("Bearer "))), None);
        assert_eq!(bearer(&parts(None)), None);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let directory = Arc::new(TokenDirectory::new());
        let id = Ulid::new();
        directory.insert("good", id, Role::Manager);

        let caller = Caller::from_request_parts(&mut parts(Some("Bearer good")), &directory)
            .await
            .unwrap();
        assert_eq!(caller, Caller { id, role: Role::Manager });

        let err = Caller::from_request_parts(&mut parts(Some("Bearer bad")), &directory)
            .await
            .unwrap_err();
        assert_eq!(err.code, "UNAUTHORIZED");
    }
}
