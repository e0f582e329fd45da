use serde::{Deserialize, Serialize};

/// The request catalogue the dispatcher must recognize (spec §6). Each
/// variant is schema-closed (`deny_unknown_fields`): extra fields fail
/// deserialization, which the dispatcher surfaces as a validation error
/// rather than an unknown-type error.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Login(LoginRequest),
    Logout(LogoutRequest),
    CreateRoom(CreateRoomRequest),
    JoinRoom(JoinRoomRequest),
    Refresh(RefreshRequest),
    Notify(NotifyRequest),
    Streaming(StreamingRequest),
    ScreenData(ScreenDataRequest),
    RequestApp(RequestAppRequest),
    ReturnApp(ReturnAppRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {
    pub teacher: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub room_id: String,
    pub teacher: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinRoomRequest {
    pub room_id: String,
    pub username: String,
    pub mssv: String,
    pub student_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub room_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyRequest {
    pub room_id: String,
    pub noti_message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingRequest {
    pub target_username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenDataRequest {
    pub image_data: String,
    pub sender_client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestAppRequest {
    pub target_username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReturnAppRequest {
    pub sender_client_id: String,
    pub app_data: Vec<AppWindow>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppWindow {
    pub process_name: String,
    pub main_window_title: String,
}

/// A room participant row, as returned by `refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub username: String,
    pub student_name: String,
    pub mssv: String,
}

/// Every dispatcher response carries at least `status` and `message`;
/// individual handlers attach extra fields (e.g. `refresh`'s `participants`)
/// by building the JSON object directly rather than through this type, since
/// the schema is not closed on the response side (spec §6: "read-style
/// responses may carry extra fields").
#[derive(Debug, Clone, Serialize)]
pub struct BasicResponse {
    pub status: &'static str,
    pub message: String,
}

impl BasicResponse {
    pub fn success(message: impl Into<String>) -> Self {
        BasicResponse { status: "success", message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        BasicResponse { status: "error", message: message.into() }
    }
}
