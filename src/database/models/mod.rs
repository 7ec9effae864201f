pub mod fridge;
pub mod notification;
pub mod practice;
pub mod user;

pub use fridge::Fridge;
pub use notification::Notification;
pub use practice::Practice;
pub use user::User;
