//! SDK layer for the `did:wba` agent interoperability runtime.
//!
//! Built on top of the pure protocol primitives in `wba-core`, this crate
//! owns the business logic that needs I/O seams but not concrete I/O:
//! - [`registry`]: Authorization-header handler dispatch
//! - [`handlers`]: the four built-in handlers (`DIDWba`, `Bearer`,
//!   `Token`/`CustomToken`, `Session`/`SessionID`)
//! - [`resolver`]: the `DidResolver` seam
//! - [`token`]: token record types and the `TokenIssuer`/`TokenCache` seams
//! - [`session`]: the optional session layer
//! - [`context`] / [`credentials`]: request-scoped and agent-owned
//!   identity types
//!
//! Concrete I/O implementations of the seams defined here live in
//! `wba-framework`.

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod token;

pub use config::AuthConfig;
pub use error::SdkError;
pub use registry::{AuthDispatch, AuthHandler, AuthResult, HandlerRegistry};
pub use session::SessionAwareAuthManager;
