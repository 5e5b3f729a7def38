pub mod event;
pub mod notification;
pub mod reply;
pub mod session;
