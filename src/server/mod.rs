//! Server module for Ergon
//!
//! Contains configuration loading, state wiring, and the HTTP run loop.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for the server
//! - `loader`: Configuration loading from files and environment
//! - `router`: Route and middleware assembly
//! - `init`: Server initialization and run loop

pub mod config;
mod init;
mod loader;
mod router;

// Re-export public API
pub use config::AppConfig;
pub use init::run;
pub use loader::load_config;
