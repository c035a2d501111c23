//! Auth-domain identifiers, scope sets, token models, and expiry policy.

pub mod expiry;
pub mod id;
pub mod scope;
pub mod token;

pub use expiry::*;
pub use id::*;
pub use scope::*;
pub use token::{record::*, secret::*, *};
