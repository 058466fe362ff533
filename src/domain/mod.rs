pub mod auth;
pub mod contact;
pub mod message;
pub mod user;
pub mod visibility;
