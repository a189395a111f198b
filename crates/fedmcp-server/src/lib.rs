//! FedMCP Server - artifact registry for federated workspaces
//!
//! Signs artifacts into compact JWS tokens, verifies tokens against a
//! keyring of trusted workspace keys, persists signed documents and keeps an
//! append-only audit trail of every mutation.

pub mod app;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod kms;
pub mod models;
pub mod routes;
pub mod service;
pub mod storage;

pub use app::build_service;
pub use config::Config;
pub use error::AppError;
pub use routes::create_router;
pub use service::ArtifactService;
