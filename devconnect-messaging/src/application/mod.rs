pub mod commands;
pub mod connection;
pub mod handlers;
pub mod queries;
