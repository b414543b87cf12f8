use axum::{http::StatusCode, response::IntoResponse, Json};
use relay_domain::StatusReply;

/// Sends an envelope, using 500 when it reports a failure.
pub fn reply(reply: StatusReply) -> impl IntoResponse {
    let status = if reply.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(reply))
}

/// `{ok: true}` for inlets that have nothing else to say.
pub fn accepted() -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "ok": true })),
    )
}
