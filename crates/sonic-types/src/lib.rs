//! Common SONiC network value types.
//!
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation) with masking and
//!   containment helpers used by prefix-based policy matching

mod ip;

pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),
}
