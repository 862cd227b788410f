use crate::middleware::error_handling;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Coarse grouping used for status codes and client-side handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Validation,
    Conflict,
    NotFound,
    Authorization,
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication_error",
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::Conflict => "conflict_error",
            ErrorCategory::NotFound => "not_found_error",
            ErrorCategory::Authorization => "authorization_error",
            ErrorCategory::Infrastructure => "server_error",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AppError {
    #[error("missing or malformed bearer credential")]
    Unauthenticated,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("message must have content or at least one attachment")]
    EmptyMessage,

    #[error("you cannot send a friend request to yourself")]
    SelfRequest,

    #[error("you cannot block yourself")]
    SelfBlock,

    #[error("chat room not found")]
    RoomNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("users with ids {} not found", join_ids(.0))]
    ParticipantNotFound(Vec<Uuid>),

    #[error("message not found")]
    MessageNotFound,

    #[error("friend request not found")]
    RequestNotFound,

    #[error("notification not found")]
    NotificationNotFound,

    #[error("receiver not found")]
    ReceiverNotFound,

    #[error("sender not found")]
    SenderNotFound,

    #[error("a friend request is already pending between these users")]
    RequestAlreadyPending,

    #[error("these users are already friends")]
    AlreadyFriends,

    #[error("this relationship is blocked")]
    Blocked,

    #[error("this request is not pending")]
    NotPending,

    #[error("a chat room with this name already exists")]
    RoomNameTaken,

    #[error("you are not a participant of this chat room")]
    NotParticipant,

    #[error("you do not own this message")]
    NotMessageOwner,

    #[error("only the receiver can answer this friend request")]
    NotRequestReceiver,

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("internal server error")]
    Internal,
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        use AppError::*;
        match self {
            Unauthenticated | InvalidCredential => ErrorCategory::Authentication,
            InvalidInput(_) | EmptyMessage | SelfRequest | SelfBlock => ErrorCategory::Validation,
            RoomNotFound | UserNotFound | ParticipantNotFound(_) | MessageNotFound
            | RequestNotFound | NotificationNotFound | ReceiverNotFound | SenderNotFound => {
                ErrorCategory::NotFound
            }
            RequestAlreadyPending | AlreadyFriends | Blocked | NotPending | RoomNameTaken => {
                ErrorCategory::Conflict
            }
            NotParticipant | NotMessageOwner | NotRequestReceiver => ErrorCategory::Authorization,
            Database(_) | Config(_) | StartServer(_) | Internal => ErrorCategory::Infrastructure,
        }
    }

    /// Machine-readable reason returned to clients
    pub fn code(&self) -> &'static str {
        use AppError::*;
        match self {
            Unauthenticated => "UNAUTHENTICATED",
            InvalidCredential => "INVALID_CREDENTIAL",
            InvalidInput(_) => "INVALID_REQUEST",
            EmptyMessage => "EMPTY_MESSAGE",
            SelfRequest => "SELF_REQUEST",
            SelfBlock => "SELF_BLOCK",
            RoomNotFound => "ROOM_NOT_FOUND",
            UserNotFound => "USER_NOT_FOUND",
            ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            MessageNotFound => "MESSAGE_NOT_FOUND",
            RequestNotFound => "REQUEST_NOT_FOUND",
            NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            ReceiverNotFound => "RECEIVER_NOT_FOUND",
            SenderNotFound => "SENDER_NOT_FOUND",
            RequestAlreadyPending => "REQUEST_ALREADY_PENDING",
            AlreadyFriends => "ALREADY_FRIENDS",
            Blocked => "BLOCKED",
            NotPending => "NOT_PENDING",
            RoomNameTaken => "ROOM_NAME_TAKEN",
            NotParticipant => "NOT_PARTICIPANT",
            NotMessageOwner => "NOT_MESSAGE_OWNER",
            NotRequestReceiver => "NOT_REQUEST_RECEIVER",
            Database(_) => "DATABASE_ERROR",
            Config(_) | StartServer(_) | Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Returns HTTP status code
    pub fn http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::Authentication => 401,
            ErrorCategory::Validation => 400,
            ErrorCategory::Authorization => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Infrastructure => 500,
        }
    }

    /// Message safe to show a client. Infrastructure detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Infrastructure => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Unique indexes whose violation maps onto a domain conflict
const FRIEND_PAIR_CONSTRAINT: &str = "friends_pair_key";
const GROUP_ROOM_NAME_CONSTRAINT: &str = "chat_rooms_group_name_key";

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23505") {
                match db_err.constraint() {
                    Some(FRIEND_PAIR_CONSTRAINT) => return AppError::RequestAlreadyPending,
                    Some(GROUP_ROOM_NAME_CONSTRAINT) => return AppError::RoomNameTaken,
                    _ => {}
                }
            }
        }
        AppError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_drive_status() {
        assert_eq!(AppError::Unauthenticated.http_status(), 401);
        assert_eq!(AppError::InvalidCredential.http_status(), 401);
        assert_eq!(AppError::SelfRequest.http_status(), 400);
        assert_eq!(AppError::EmptyMessage.http_status(), 400);
        assert_eq!(AppError::NotPending.http_status(), 409);
        assert_eq!(AppError::RequestAlreadyPending.http_status(), 409);
        assert_eq!(AppError::RoomNotFound.http_status(), 404);
        assert_eq!(AppError::NotParticipant.http_status(), 403);
        assert_eq!(AppError::NotMessageOwner.http_status(), 403);
        assert_eq!(AppError::Database("boom".into()).http_status(), 500);
    }

    #[test]
    fn test_infrastructure_detail_is_hidden() {
        let err = AppError::Database("connection refused to 10.0.0.3".into());
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(AppError::Blocked.public_message(), "this relationship is blocked");
    }

    #[test]
    fn test_participant_not_found_lists_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let msg = AppError::ParticipantNotFound(vec![a, b]).to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
    }

    #[test]
    fn test_non_database_sqlx_error_maps_to_database() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
    }
}
