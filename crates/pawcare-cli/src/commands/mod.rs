pub mod auth;
pub mod call;
pub mod config;
pub mod level;
pub mod reminder;
