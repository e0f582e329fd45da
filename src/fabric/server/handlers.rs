use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::fabric::server::collaborators::{AuthStore, RoomStore};
use crate::fabric::server::directory_store::ClientDirectory;
use crate::fabric::server::push::Push;
use crate::fabric::server::schema::*;

/// Everything a handler needs, bundled per dispatch (spec §4.7): the
/// directory, the push-sender bound to the caller's LB connection, the
/// caller's own client_id, and the two out-of-scope collaborators.
pub struct HandlerContext {
    pub directory: ClientDirectory,
    pub push: Push,
    pub auth: Arc<dyn AuthStore>,
    pub rooms: Arc<dyn RoomStore>,
    pub caller_client_id: String,
}

/// `notify`'s richer return type (SPEC_FULL §3): which recipients got the
/// push and which were offline, both reported back to the sender.
#[derive(Debug, Serialize)]
pub struct NotifyOutcome {
    pub sent: Vec<String>,
    pub offline: Vec<String>,
}

pub async fn login(ctx: &HandlerContext, req: &LoginRequest) -> Value {
    let role = match req.role {
        Role::Teacher => "teacher",
        Role::Student => "student",
    };
    let authenticated = match ctx.auth.authenticate(&req.username, &req.password, role).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, username = %req.username, "auth store error during login");
            false
        }
    };
    if !authenticated {
        return json!(BasicResponse::error("Invalid credentials"));
    }

    // A directory-registration failure must not fail the login itself (spec
    // §4.8): the user is online but unreachable by username-addressed push
    // until the next successful registration.
    if let Err(e) = ctx.directory.register(&req.username, &ctx.caller_client_id) {
        warn!(error = %e, username = %req.username, "failed to register client in directory after successful login");
    }

    json!(BasicResponse::success("Login successful"))
}

pub async fn logout(ctx: &HandlerContext, req: &LogoutRequest) -> Value {
    if let Err(e) = ctx.rooms.delete_room(&req.room_id).await {
        warn!(error = %e, room_id = %req.room_id, "failed to delete room during logout");
    }
    if let Err(e) = ctx.directory.unregister_by_username(&req.teacher) {
        warn!(error = %e, teacher = %req.teacher, "failed to unregister directory entry during logout");
    }
    json!(BasicResponse::success("Logout successful"))
}

pub async fn create_room(ctx: &HandlerContext, req: &CreateRoomRequest) -> Value {
    match ctx.rooms.create_room(&req.room_id, &req.teacher).await {
        Ok(true) => json!(BasicResponse::success(format!("Room {} created successfully", req.room_id))),
        Ok(false) => json!(BasicResponse::error("Room creation failed, possibly room ID already exists.")),
        Err(e) => {
            warn!(error = %e, room_id = %req.room_id, "room store error during create_room");
            json!(BasicResponse::error("Internal server error during room creation"))
        }
    }
}

pub async fn join_room(ctx: &HandlerContext, req: &JoinRoomRequest) -> Value {
    match ctx.rooms.room_exists(&req.room_id).await {
        Ok(false) => return json!(BasicResponse::error(format!("Room {} does not exist.", req.room_id))),
        Err(e) => {
            warn!(error = %e, room_id = %req.room_id, "room store error checking room_exists");
            return json!(BasicResponse::error("Internal server error during join_room"));
        }
        Ok(true) => {}
    }

    match ctx.rooms.join_room(&req.room_id, &req.username, &req.student_name, &req.mssv).await {
        Ok(true) => json!(BasicResponse::success(format!("Joined room {} successfully!", req.room_id))),
        Ok(false) => {
            // Might already be a participant — treat that as success, same
            // as the original handler's reconciliation path.
            match ctx.rooms.room_participants(&req.room_id).await {
                Ok(participants) if participants.iter().any(|p| p.username == req.username) => {
                    json!(BasicResponse::success(format!("Already in room {}.", req.room_id)))
                }
                _ => json!(BasicResponse::error("Failed to join room. Please try again.")),
            }
        }
        Err(e) => {
            warn!(error = %e, room_id = %req.room_id, "room store error during join_room");
            json!(BasicResponse::error("Internal server error during join_room"))
        }
    }
}

pub async fn refresh(ctx: &HandlerContext, req: &RefreshRequest) -> Value {
    match ctx.rooms.room_participants(&req.room_id).await {
        Ok(participants) => json!({
            "status": "success",
            "message": "Participants fetched successfully",
            "participants": participants,
        }),
        Err(e) => {
            warn!(error = %e, room_id = %req.room_id, "room store error during refresh");
            json!(BasicResponse::error(format!("Room '{}' not found.", req.room_id)))
        }
    }
}

pub async fn notify(ctx: &HandlerContext, req: &NotifyRequest) -> Value {
    let participants = match ctx.rooms.room_participants(&req.room_id).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, room_id = %req.room_id, "room store error during notify");
            return json!(BasicResponse::error(format!("Room '{}' not found.", req.room_id)));
        }
    };

    let mut sent = Vec::new();
    let mut offline = Vec::new();

    for participant in &participants {
        let client_id = match ctx.directory.lookup_client_id(&participant.username) {
            Ok(Some(c)) => c,
            Ok(None) => {
                offline.push(participant.username.clone());
                continue;
            }
            Err(e) => {
                warn!(error = %e, username = %participant.username, "directory lookup failed during notify");
                offline.push(participant.username.clone());
                continue;
            }
        };

        let push_payload = json!({
            "type": "notify",
            "room_id": req.room_id,
            "noti_message": req.noti_message,
        });
        match ctx.push.send(&client_id, &push_payload).await {
            Ok(()) => sent.push(participant.username.clone()),
            Err(e) => {
                warn!(error = %e, username = %participant.username, "failed to push notify message");
                offline.push(participant.username.clone());
            }
        }
    }

    let outcome = NotifyOutcome { sent, offline };
    json!({
        "status": "success",
        "message": "Notification sent",
        "sent": outcome.sent,
        "offline": outcome.offline,
    })
}

pub async fn streaming(ctx: &HandlerContext, req: &StreamingRequest) -> Value {
    let target_client_id = match ctx.directory.lookup_client_id(&req.target_username) {
        Ok(Some(c)) => c,
        Ok(None) => {
            return json!(BasicResponse::error(format!(
                "User '{}' is currently offline or does not exist.",
                req.target_username
            )))
        }
        Err(e) => {
            warn!(error = %e, username = %req.target_username, "directory lookup failed during streaming");
            return json!(BasicResponse::error("Internal server error during streaming request"));
        }
    };

    if target_client_id == ctx.caller_client_id {
        return json!(BasicResponse::error("You cannot initiate a stream from yourself."));
    }

    let push_payload = json!({
        "type": "start_streaming",
        "sender_client_id": ctx.caller_client_id,
    });
    match ctx.push.send(&target_client_id, &push_payload).await {
        Ok(()) => json!(BasicResponse::success(format!(
            "Streaming request successfully sent to user '{}'.",
            req.target_username
        ))),
        Err(e) => {
            warn!(error = %e, username = %req.target_username, "failed to push streaming request");
            json!(BasicResponse::error(format!(
                "Failed to send streaming request to '{}'. They might have just disconnected.",
                req.target_username
            )))
        }
    }
}

pub async fn screen_data(ctx: &HandlerContext, req: &ScreenDataRequest) -> Value {
    if req.sender_client_id.is_empty() {
        return json!(BasicResponse::error("No teacher found in your room."));
    }

    let push_payload = json!({
        "type": "screen_data",
        "image_data": req.image_data,
    });
    match ctx.push.send(&req.sender_client_id, &push_payload).await {
        Ok(()) => json!(BasicResponse::success("Screen data forwarded to teacher.")),
        Err(e) => {
            warn!(error = %e, target = %req.sender_client_id, "failed to forward screen data");
            json!(BasicResponse::error("Internal error while forwarding screen data."))
        }
    }
}

pub async fn request_app(ctx: &HandlerContext, req: &RequestAppRequest) -> Value {
    let target_client_id = match ctx.directory.lookup_client_id(&req.target_username) {
        Ok(Some(c)) => c,
        Ok(None) => {
            return json!(BasicResponse::error(format!(
                "User '{}' is currently offline or does not exist.",
                req.target_username
            )))
        }
        Err(e) => {
            warn!(error = %e, username = %req.target_username, "directory lookup failed during request_app");
            return json!(BasicResponse::error("Internal server error during request_app"));
        }
    };

    if target_client_id == ctx.caller_client_id {
        return json!(BasicResponse::error("You cannot send to yourself."));
    }

    let push_payload = json!({
        "type": "request_app",
        "sender_client_id": ctx.caller_client_id,
    });
    match ctx.push.send(&target_client_id, &push_payload).await {
        Ok(()) => json!(BasicResponse::success(format!(
            "Running application request successfully sent to user '{}'.",
            req.target_username
        ))),
        Err(e) => {
            warn!(error = %e, username = %req.target_username, "failed to push request_app");
            json!(BasicResponse::error(format!("Failed to send 'request_app' to {}", req.target_username)))
        }
    }
}

pub async fn return_app(ctx: &HandlerContext, req: &ReturnAppRequest) -> Value {
    if req.sender_client_id == ctx.caller_client_id {
        return json!(BasicResponse::error("You cannot send to yourself."));
    }

    let push_payload = json!({
        "type": "return_app",
        "app_data": req.app_data,
    });
    match ctx.push.send(&req.sender_client_id, &push_payload).await {
        Ok(()) => json!(BasicResponse::success(format!(
            "Application data successfully sent to client '{}'.",
            req.sender_client_id
        ))),
        Err(e) => {
            warn!(error = %e, target = %req.sender_client_id, "failed to send return_app payload");
            json!(BasicResponse::error(format!(
                "Internal error while processing application data from client '{}'.",
                req.sender_client_id
            )))
        }
    }
}
