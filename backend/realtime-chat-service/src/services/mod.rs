pub mod friend_service;
pub mod message_service;
pub mod notification_service;
pub mod room_service;

pub use friend_service::FriendService;
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use room_service::RoomService;
