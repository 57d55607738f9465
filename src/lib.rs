pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod service;
pub mod session;
pub mod storage;

pub use config::ServerConfig;
pub use server::Server;
pub use service::WorkspaceService;
