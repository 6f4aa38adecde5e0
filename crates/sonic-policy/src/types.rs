//! Small value types shared across the engine.

use std::fmt;
use std::str::FromStr;

use sonic_types::IpPrefix;

use crate::error::{PolicyError, Result};

/// Configuration operation applied to back-reference and index tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigOp {
    /// Add the reference / entry.
    Add,
    /// Remove the reference / entry.
    Delete,
}

impl ConfigOp {
    pub fn is_add(&self) -> bool {
        matches!(self, ConfigOp::Add)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ConfigOp::Delete)
    }
}

impl fmt::Display for ConfigOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOp::Add => f.write_str("add"),
            ConfigOp::Delete => f.write_str("delete"),
        }
    }
}

/// How a statement combines its conditions, or how a policy walks its
/// statements.
///
/// For statements: `All` requires every condition to hold, `Any` requires
/// one. For policies: `Any` stops at the first matching statement, `All`
/// runs every matching statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    Any,
    All,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Any => "any",
            MatchMode::All => "all",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "any" => Ok(MatchMode::Any),
            "all" => Ok(MatchMode::All),
            other => Err(PolicyError::InvalidMatchMode(other.to_string())),
        }
    }
}

/// Mask-length semantics of a prefix match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskRange {
    /// Only the keyed prefix itself matches.
    Exact,
    /// Any subnet of the keyed prefix whose length is in `[low, high]`.
    Range { low: u8, high: u8 },
}

impl MaskRange {
    /// Literal meaning "no range check".
    pub const EXACT: &'static str = "exact";

    /// Checks that the range fits the address family of `prefix`.
    pub fn validate_for(&self, prefix: &IpPrefix) -> Result<()> {
        if let MaskRange::Range { high, .. } = *self {
            if high > prefix.max_len() {
                return Err(PolicyError::InvalidRange(format!(
                    "{} (max {} for {})",
                    self,
                    prefix.max_len(),
                    prefix
                )));
            }
        }
        Ok(())
    }

    /// Returns true if `dest` is selected by an entry keyed on `key`.
    pub fn matches(&self, key: &IpPrefix, dest: &IpPrefix) -> bool {
        match *self {
            MaskRange::Exact => key.network() == dest.network(),
            MaskRange::Range { low, high } => {
                let len = dest.prefix_len();
                key.contains(dest) && low <= len && len <= high
            }
        }
    }
}

impl fmt::Display for MaskRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskRange::Exact => f.write_str(Self::EXACT),
            MaskRange::Range { low, high } => write!(f, "{}..{}", low, high),
        }
    }
}

impl FromStr for MaskRange {
    type Err = PolicyError;

    /// Parses `"exact"` or `"<low>..<high>"`.
    fn from_str(s: &str) -> Result<Self> {
        if s == Self::EXACT {
            return Ok(MaskRange::Exact);
        }

        let bounds: Vec<&str> = s.split("..").collect();
        if bounds.len() != 2 {
            return Err(PolicyError::InvalidRange(s.to_string()));
        }

        let low: u8 = bounds[0]
            .trim()
            .parse()
            .map_err(|_| PolicyError::InvalidRange(s.to_string()))?;
        let high: u8 = bounds[1]
            .trim()
            .parse()
            .map_err(|_| PolicyError::InvalidRange(s.to_string()))?;

        if low > high {
            return Err(PolicyError::InvalidRange(s.to_string()));
        }

        Ok(MaskRange::Range { low, high })
    }
}

/// Traffic direction a policy filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyDirection {
    Import,
    Export,
    Global,
}

impl PolicyDirection {
    /// Resolves the three boundary flags into a single direction.
    ///
    /// Exactly one flag must be set.
    pub fn from_flags(policy: &str, import: bool, export: bool, global: bool) -> Result<Self> {
        match (import, export, global) {
            (true, false, false) => Ok(PolicyDirection::Import),
            (false, true, false) => Ok(PolicyDirection::Export),
            (false, false, true) => Ok(PolicyDirection::Global),
            (false, false, false) => Err(PolicyError::MissingDirection(policy.to_string())),
            _ => Err(PolicyError::AmbiguousDirection(policy.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDirection::Import => "import",
            PolicyDirection::Export => "export",
            PolicyDirection::Global => "global",
        }
    }
}

impl fmt::Display for PolicyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pfx(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_match_mode_parse() {
        assert_eq!("any".parse::<MatchMode>().unwrap(), MatchMode::Any);
        assert_eq!("all".parse::<MatchMode>().unwrap(), MatchMode::All);
        assert_eq!(
            "some".parse::<MatchMode>(),
            Err(PolicyError::InvalidMatchMode("some".to_string()))
        );
        assert!("ANY".parse::<MatchMode>().is_err());
    }

    #[test]
    fn test_mask_range_parse() {
        assert_eq!("exact".parse::<MaskRange>().unwrap(), MaskRange::Exact);
        assert_eq!(
            "24..32".parse::<MaskRange>().unwrap(),
            MaskRange::Range { low: 24, high: 32 }
        );
        for bad in ["24", "24..", "..32", "24..32..33", "a..b", "30..24", "-1..8", ""] {
            assert!(
                matches!(bad.parse::<MaskRange>(), Err(PolicyError::InvalidRange(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_mask_range_validate_for_family() {
        let range: MaskRange = "24..33".parse().unwrap();
        assert!(range.validate_for(&pfx("10.0.0.0/8")).is_err());
        assert!(range.validate_for(&pfx("2001:db8::/32")).is_ok());
        assert!(MaskRange::Exact.validate_for(&pfx("10.0.0.0/8")).is_ok());
    }

    #[test]
    fn test_range_matching() {
        let key = pfx("10.0.0.0/8");
        let range = MaskRange::Range { low: 16, high: 24 };
        assert!(range.matches(&key, &pfx("10.1.2.0/24")));
        assert!(range.matches(&key, &pfx("10.1.0.0/16")));
        assert!(!range.matches(&key, &pfx("10.1.2.0/28")));
        assert!(!range.matches(&key, &pfx("10.0.0.0/8")));
        assert!(!range.matches(&key, &pfx("11.1.2.0/24")));
    }

    #[test]
    fn test_exact_matching() {
        let key = pfx("10.0.0.0/8");
        assert!(MaskRange::Exact.matches(&key, &pfx("10.1.2.0/8")));
        assert!(!MaskRange::Exact.matches(&key, &pfx("10.1.2.0/24")));
    }

    #[test]
    fn test_direction_from_flags() {
        assert_eq!(
            PolicyDirection::from_flags("p", true, false, false).unwrap(),
            PolicyDirection::Import
        );
        assert_eq!(
            PolicyDirection::from_flags("p", false, false, true).unwrap(),
            PolicyDirection::Global
        );
        assert_eq!(
            PolicyDirection::from_flags("p", false, false, false),
            Err(PolicyError::MissingDirection("p".to_string()))
        );
        assert_eq!(
            PolicyDirection::from_flags("p", true, true, false),
            Err(PolicyError::AmbiguousDirection("p".to_string()))
        );
    }
}
