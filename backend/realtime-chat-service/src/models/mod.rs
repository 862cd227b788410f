pub mod friend;
pub mod message;
pub mod notification;
pub mod room;
pub mod user;

pub use friend::{AcceptedFriendship, Friend, FriendStatus, ReceivedRequest};
pub use message::{ChatMessage, MessageRow, NewMessage};
pub use notification::{NewNotification, Notification, NotificationRow, NotificationType};
pub use room::{direct_pair, direct_room_name, ChatRoom, RoomDetails, RoomType};
pub use user::{User, UserSummary};
