//! Request identity. Token issuance lives elsewhere; this module only resolves a presented
//! token (bearer header or `token` cookie) to the acting account.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use crate::workflows::jobs::domain::{ClientId, WorkerId};

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Client,
    Worker,
    Admin,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Client => "client",
            ActorRole::Worker => "worker",
            ActorRole::Admin => "admin",
        }
    }
}

/// Authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Client(ClientId),
    Worker(WorkerId),
    Admin(String),
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Client(_) => ActorRole::Client,
            Actor::Worker(_) => ActorRole::Worker,
            Actor::Admin(_) => ActorRole::Admin,
        }
    }

    pub fn as_client(&self) -> Result<&ClientId, AccessError> {
        match self {
            Actor::Client(id) => Ok(id),
            _ => Err(AccessError::WrongRole {
                required: ActorRole::Client,
            }),
        }
    }

    pub fn as_worker(&self) -> Result<&WorkerId, AccessError> {
        match self {
            Actor::Worker(id) => Ok(id),
            _ => Err(AccessError::WrongRole {
                required: ActorRole::Worker,
            }),
        }
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        match self {
            Actor::Admin(_) => Ok(()),
            _ => Err(AccessError::WrongRole {
                required: ActorRole::Admin,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("this action requires a {} account", .required.label())]
    WrongRole { required: ActorRole },
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessError::WrongRole { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "UNAUTHENTICATED",
            AccessError::WrongRole { .. } => "FORBIDDEN",
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), axum::Json(payload)).into_response()
    }
}

/// Resolves opaque session tokens. Installed on routers as an `Extension`.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Actor>;
}

pub type SharedSessions = Arc<dyn SessionVerifier>;

/// Token table for single-process deployments and tests.
#[derive(Default, Clone)]
pub struct InMemorySessions {
    tokens: Arc<RwLock<HashMap<String, Actor>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh random token for the actor.
    pub fn issue(&self, actor: Actor) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.insert(token.clone(), actor);
        token
    }

    pub fn insert(&self, token: impl Into<String>, actor: Actor) {
        if let Ok(mut guard) = self.tokens.write() {
            guard.insert(token.into(), actor);
        }
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens
            .write()
            .map(|mut guard| guard.remove(token).is_some())
            .unwrap_or(false)
    }
}

impl SessionVerifier for InMemorySessions {
    fn verify(&self, token: &str) -> Option<Actor> {
        self.tokens.read().ok()?.get(token).cloned()
    }
}

/// Extractor yielding the authenticated [`Actor`].
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    S: Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let sessions = parts
            .extensions
            .get::<SharedSessions>()
            .cloned()
            .ok_or(AccessError::Unauthenticated)?;
        let token = presented_token(parts).ok_or(AccessError::Unauthenticated)?;
        sessions
            .verify(&token)
            .map(AuthenticatedActor)
            .ok_or(AccessError::Unauthenticated)
    }
}

fn presented_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
