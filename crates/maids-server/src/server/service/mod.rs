pub mod auth;
pub mod handler;
pub mod reply;
