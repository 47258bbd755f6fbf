pub mod articles;
pub mod auth;
pub mod categories;
pub mod health;
pub mod newsletter;
pub mod slug;
