use serde_json::{json, Value};

use crate::fabric::server::handlers::{self, HandlerContext};
use crate::fabric::server::schema::{BasicResponse, Request};

const KNOWN_TYPES: &[&str] = &[
    "login",
    "logout",
    "create_room",
    "join_room",
    "refresh",
    "notify",
    "streaming",
    "screen_data",
    "request_app",
    "return_app",
];

/// dispatch implements spec §4.7: parse JSON, validate against the schema
/// registered for `type`, invoke the handler, and return the JSON value to
/// be wrapped in a response envelope. Every failure path here returns a
/// `{status:"error", message}` object rather than propagating — malformed
/// or unrecognized requests never close the connection.
pub async fn dispatch(ctx: &HandlerContext, payload: &[u8]) -> Value {
    let value: Value = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => return json!(BasicResponse::error(format!("Malformed JSON payload: {e}"))),
    };

    let Some(type_str) = value.get("type").and_then(|t| t.as_str()).map(str::to_string) else {
        return json!(BasicResponse::error("Missing or invalid 'type' field"));
    };

    if !KNOWN_TYPES.contains(&type_str.as_str()) {
        return json!(BasicResponse::error(format!("Unknown request type: {type_str}")));
    }

    let request: Request = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return json!(BasicResponse::error(format!("Invalid '{type_str}' payload: {e}"))),
    };

    match request {
        Request::Login(req) => handlers::login(ctx, &req).await,
        Request::Logout(req) => handlers::logout(ctx, &req).await,
        Request::CreateRoom(req) => handlers::create_room(ctx, &req).await,
        Request::JoinRoom(req) => handlers::join_room(ctx, &req).await,
        Request::Refresh(req) => handlers::refresh(ctx, &req).await,
        Request::Notify(req) => handlers::notify(ctx, &req).await,
        Request::Streaming(req) => handlers::streaming(ctx, &req).await,
        Request::ScreenData(req) => handlers::screen_data(ctx, &req).await,
        Request::RequestApp(req) => handlers::request_app(ctx, &req).await,
        Request::ReturnApp(req) => handlers::return_app(ctx, &req).await,
    }
}
