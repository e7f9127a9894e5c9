//! API Middleware
//!
//! Caller identification and request logging.

use std::net::SocketAddr;

use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::TokenService;
use crate::domain::OperationContext;
use crate::error::AppError;

/// Caller identity taken from a verified bearer token
#[derive(Debug, Clone, Copy)]
pub struct RequestUser {
    pub user_id: Uuid,
}

/// Marks a request whose bearer token was sent but failed verification
#[derive(Debug, Clone, Copy)]
struct TokenRejected;

/// Rejects with 401 unless the auth middleware verified a token
#[async_trait]
impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<RequestUser>() {
            return Ok(*user);
        }

        if parts.extensions.get::<TokenRejected>().is_some() {
            Err(AppError::InvalidToken)
        } else {
            Err(AppError::MissingToken)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
/// `Ok(None)` when the header is absent.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AppError::InvalidToken)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::InvalidToken),
    }
}

// =========================================================================
// Authentication Middleware
// =========================================================================

/// Build the operation context and, when a bearer token is sent, verify it.
///
/// The middleware never rejects. Routes that need a caller extract
/// [`RequestUser`], which answers 401 `missing_token` or `invalid_token`;
/// public routes serve a request with a stale token anonymously.
pub async fn auth_middleware(
    State(tokens): State<TokenService>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Extract correlation ID or generate new one
    let correlation_id = request
        .headers()
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new().with_correlation_id(correlation_id);

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        context = context.with_client_ip(addr.ip());
    }

    let verified = bearer_token(request.headers()).and_then(|token| match token {
        Some(token) => tokens.verify(token).map(Some).map_err(|e| {
            tracing::debug!(correlation_id = %correlation_id, error = %e, "Bearer token rejected");
            AppError::InvalidToken
        }),
        None => Ok(None),
    });

    match verified {
        Ok(Some(user_id)) => {
            context = context.with_request_user(user_id);
            request.extensions_mut().insert(RequestUser { user_id });
        }
        Ok(None) => {}
        Err(_) => {
            request.extensions_mut().insert(TokenRejected);
        }
    }

    request.extensions_mut().insert(context);

    next.run(request).await
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    // Mask sensitive headers
    let headers = mask_headers_for_logging(request.headers());

    let (correlation_id, client_ip) = request
        .extensions()
        .get::<OperationContext>()
        .map(|ctx| (ctx.correlation_id, ctx.client_ip))
        .unwrap_or_default();
    let user_id = request
        .extensions()
        .get::<RequestUser>()
        .map(|user| user.user_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        client_ip = ?client_ip,
        user_id = ?user_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
