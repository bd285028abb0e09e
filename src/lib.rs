pub mod agent;
pub mod app;
pub mod chat;
pub mod config;
pub mod handler;
pub mod logging;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use agent::{AgentClient, AgentError};
pub use chat::{ChatLine, ChatSession, Sender};
pub use config::{Config, ConfigError};
