//! # Services
//!
//! Collaborator interfaces, their in-memory implementations, and the session
//! binder that sits on top of them.

pub mod collaborators;
pub mod memory;
pub mod session_binder;

pub use collaborators::{
    Extraction, ProductExtractor, ProxyDirectory, SessionStore, Transport, TransportResponse,
};
pub use memory::{InMemoryProxyDirectory, InMemorySessionStore};
pub use session_binder::{BindRequest, BoundResource, MatchType, SessionBinder};
