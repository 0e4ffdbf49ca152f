//! Identity Module
//!
//! Resolves the active identity into the namespace prefix that isolates
//! cached data per user.

pub mod naming;
pub mod resolver;

pub use naming::{NAMESPACE_MARKER, Namespace};
pub use resolver::{IdentityProvider, IdentityResolver, StaticIdentity};
