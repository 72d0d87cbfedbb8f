//! # CMDB Server
//!
//! In-memory reference CMDB for tests and local runs.
//!
//! This crate provides:
//! - The table query, class metadata and identify-and-reconcile endpoints
//! - Identify-and-reconcile semantics (match by class and name, then merge)
//! - Basic authentication
//! - Per-endpoint failure injection
//!
//! # Architecture
//!
//! The server has no network listener. It handles already-parsed requests
//! whose path is relative to the API root, so a client can route its HTTP
//! calls to it in-process.
//!
//! # Authentication
//!
//! Authentication is optional:
//!
//! ```rust
//! use cmdb_server::{CmdbServer, Request, ServerConfig};
//!
//! let server = CmdbServer::new(ServerConfig::default().with_auth("admin", "secret"));
//! server.define_class("server", ["ip"]);
//!
//! let denied = server.handle(&Request::get("/cmdb/meta/server"));
//! assert_eq!(denied.status, 401);
//!
//! let allowed = server.handle(
//!     &Request::get("/cmdb/meta/server").with_basic_auth("admin", "secret"),
//! );
//! assert_eq!(allowed.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use auth::{AuthConfig, BasicAuthValidator, Credentials};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, Request, RequestHandler, Response};
pub use server::CmdbServer;
pub use store::{CmdbStore, CLASS_FIELD, IDENTIFY_FIELD, SYS_ID_FIELD};
