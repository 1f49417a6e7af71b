//! DNS message codec (§4.B/§4.C) and recursive-resolver client (§4.D).
//!
//! ```text
//! dns::resolver -> dns::message -> name
//! ```

mod display;
mod error;
mod from_str;
mod message;
mod resolver;
mod transport;
mod types;

pub use error::Error;
pub use from_str::FromStrError;
pub use resolver::{HostLookup, Resolver, ResolverConfig};
pub use types::*;
