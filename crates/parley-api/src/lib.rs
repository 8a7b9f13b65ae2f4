pub mod auth;
pub mod chat;
pub mod middleware;
pub mod profile;
pub mod rooms;
