//! Optional bearer-token guard for the `/api` routes.
//!
//! With no tokens configured every request passes. Token comparison is
//! constant-time.

use crate::error::DashboardError;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ApiAuth {
    tokens: Vec<String>,
}

impl ApiAuth {
    /// Build from configured tokens. Blank entries are a configuration error.
    pub fn from_tokens(tokens: &[String]) -> Result<Self, DashboardError> {
        let mut accepted: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                return Err(DashboardError::configuration(
                    "Empty auth token in configuration",
                ));
            }
            if !accepted.iter().any(|t| t == token) {
                accepted.push(token.to_string());
            }
        }
        Ok(Self { tokens: accepted })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Check the `Authorization` header of a request.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), DashboardError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let provided = bearer_token(headers)?;
        // Compare against every token so timing does not reveal which matched
        let matched = self
            .tokens
            .iter()
            .fold(false, |acc, expected| acc | tokens_equal(provided, expected));
        if matched {
            Ok(())
        } else {
            warn!(token_prefix = %mask_token(provided), "Rejected API request: unknown token");
            Err(DashboardError::unauthorized(
                "Invalid bearer token",
                "Use one of the tokens configured on the server",
            ))
        }
    }
}

/// Axum middleware enforcing [`ApiAuth`].
pub async fn require_bearer(
    State(auth): State<Arc<ApiAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, DashboardError> {
    let value = headers.get(header::AUTHORIZATION).ok_or_else(|| {
        DashboardError::unauthorized(
            "Missing bearer token",
            "Send 'Authorization: Bearer <token>'",
        )
    })?;
    let value = value.to_str().map_err(|_| {
        DashboardError::unauthorized(
            "Authorization header contains invalid characters",
            "Send 'Authorization: Bearer <token>'",
        )
    })?;
    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(DashboardError::unauthorized(
            "Malformed Authorization header",
            "Send 'Authorization: Bearer <token>'",
        )),
    }
}

fn tokens_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(3).collect();
    format!("{}***", prefix)
}
