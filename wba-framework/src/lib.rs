//! In-process default implementations of the SDK's storage and transport
//! seams: DID resolution, token and session storage, the per-agent
//! contact book, and the two-way authentication client.

pub mod client;
pub mod contact;
pub mod resolver;
pub mod session_store;
pub mod token_store;

pub use client::{ClientCallOutcome, TwoWayAuthClient, BEARER_TOKEN_HEADER};
pub use contact::{ContactBook, ContactRecord};
pub use resolver::{CachedResolver, ChainResolver, HttpResolver, LocalFsResolver};
pub use session_store::InMemorySessionStore;
pub use token_store::{InMemoryTokenCache, InMemoryTokenIssuer};
