use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::notifier::{Notifier, OtpChannel};
use super::service::{VerificationError, VerificationService};
use super::store::OtpStore;

pub fn verification_router<S, N>(service: Arc<VerificationService<S, N>>) -> Router
where
    S: OtpStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/otp/send", post(send_handler::<S, N>))
        .route("/otp/verify", post(verify_handler::<S, N>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    channel: OtpChannel,
    destination: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    channel: OtpChannel,
    destination: String,
    code: String,
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "verification request failed");
        }
        let payload = json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        (status, Json(payload)).into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, VerificationError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| VerificationError::Invalid(rejection.body_text()))
}

async fn send_handler<S, N>(
    State(service): State<Arc<VerificationService<S, N>>>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Response, VerificationError>
where
    S: OtpStore + 'static,
    N: Notifier + 'static,
{
    let request = body(payload)?;
    let dispatch = service.send(request.channel, &request.destination)?;
    Ok((StatusCode::ACCEPTED, Json(dispatch)).into_response())
}

async fn verify_handler<S, N>(
    State(service): State<Arc<VerificationService<S, N>>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Response, VerificationError>
where
    S: OtpStore + 'static,
    N: Notifier + 'static,
{
    let request = body(payload)?;
    service.verify(request.channel, &request.destination, &request.code)?;
    Ok((StatusCode::OK, Json(json!({ "verified": true }))).into_response())
}
