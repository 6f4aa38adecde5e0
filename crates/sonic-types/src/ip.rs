//! IP address and prefix types with safe parsing and prefix arithmetic.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 address wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    /// Returns this address with every bit past `len` cleared.
    pub fn masked(&self, len: u8) -> Self {
        let bits = u32::from(self.0);
        let mask = match len {
            0 => 0,
            l if l >= 32 => u32::MAX,
            l => u32::MAX << (32 - u32::from(l)),
        };
        Ipv4Address(Ipv4Addr::from(bits & mask))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

/// An IPv6 address wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv6Address(Ipv6Addr);

impl Ipv6Address {
    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    /// Returns this address with every bit past `len` cleared.
    pub fn masked(&self, len: u8) -> Self {
        let bits = u128::from(self.0);
        let mask = match len {
            0 => 0,
            l if l >= 128 => u128::MAX,
            l => u128::MAX << (128 - u32::from(l)),
        };
        Ipv6Address(Ipv6Addr::from(bits & mask))
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Ipv6Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

/// An IP address that can be either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl IpAddress {
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Width of the address family in bits (32 or 128).
    pub const fn bit_width(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    /// Returns this address with every bit past `len` cleared.
    pub fn masked(&self, len: u8) -> Self {
        match self {
            IpAddress::V4(addr) => IpAddress::V4(addr.masked(len)),
            IpAddress::V6(addr) => IpAddress::V6(addr.masked(len)),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            s.parse::<Ipv6Address>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Address>().map(IpAddress::V4)
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(Ipv4Address(addr))
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(Ipv6Address(addr))
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The stored address keeps whatever host bits it was parsed with;
/// [`IpPrefix::network`] yields the canonical form used as a lookup key.
/// On the wire (serde) a prefix is its CIDR string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.bit_width();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Longest prefix length allowed for this address family.
    pub const fn max_len(&self) -> u8 {
        self.address.bit_width()
    }

    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.bit_width()
    }

    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    /// Returns the prefix with host bits cleared (`10.1.2.3/8` -> `10.0.0.0/8`).
    pub fn network(&self) -> IpPrefix {
        IpPrefix {
            address: self.address.masked(self.prefix_len),
            prefix_len: self.prefix_len,
        }
    }

    /// Returns the covering prefix of length `len`, or `None` when `len`
    /// is longer than this prefix.
    pub fn supernet(&self, len: u8) -> Option<IpPrefix> {
        if len > self.prefix_len {
            return None;
        }
        Some(IpPrefix {
            address: self.address.masked(len),
            prefix_len: len,
        })
    }

    /// Returns true if `other` is this prefix or one of its subnets.
    ///
    /// Prefixes of different address families never contain each other.
    pub fn contains(&self, other: &IpPrefix) -> bool {
        if self.is_ipv4() != other.is_ipv4() || other.prefix_len < self.prefix_len {
            return false;
        }
        other.address.masked(self.prefix_len) == self.address.masked(self.prefix_len)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}
