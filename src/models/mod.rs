//! # Data Model
//!
//! Value types shared by the binder, the matcher and the orchestrator:
//! sessions and their cookie jars, egress endpoints, search targets,
//! scanned product records and per-page fetch outcomes.

pub mod endpoint;
pub mod network;
pub mod page;
pub mod product;
pub mod session;

pub use endpoint::EgressEndpoint;
pub use network::{same_subnet, subnet_of, AddressError};
pub use page::{PageFetchOutcome, PageStatus};
pub use product::{ProductRecord, TargetIdentity};
pub use session::{
    Cookie, CookieJar, SessionFingerprint, SessionId, SessionResource, SessionStatus,
};
