pub mod archive;
pub mod config;
pub mod dispatch;
pub mod dump;
pub mod env;
pub mod error;
pub mod log_sanitize;
pub mod request;
pub mod runner;
pub mod upload;

pub use dispatch::Dispatcher;
pub use error::{Error, Result};
