//! DevConnect 私信服务
//!
//! 一对一消息的持久化、会话索引与在线实时推送

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interface;
pub mod service;

pub use config::MessagingConfig;
pub use error::{MessagingError, MessagingResult};
pub use service::MessagingServiceApp;
