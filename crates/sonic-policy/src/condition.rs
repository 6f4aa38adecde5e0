//! Match conditions and named prefix sets.

use serde::{Deserialize, Serialize};
use sonic_types::IpPrefix;

use crate::error::{PolicyError, Result};
use crate::registry::HasBackRefs;
use crate::types::MaskRange;

/// A prefix plus its mask-length literal, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSpec {
    pub ip_prefix: IpPrefix,
    /// `"exact"` or `"<low>..<high>"`.
    #[serde(default = "default_masklength_range")]
    pub masklength_range: String,
}

fn default_masklength_range() -> String {
    MaskRange::EXACT.to_string()
}

impl PrefixSpec {
    pub fn new(ip_prefix: IpPrefix, masklength_range: impl Into<String>) -> Self {
        Self {
            ip_prefix,
            masklength_range: masklength_range.into(),
        }
    }

    /// Parses the literal and checks it against the prefix family.
    pub fn resolve(&self) -> Result<(IpPrefix, MaskRange)> {
        let range: MaskRange = self.masklength_range.parse()?;
        range.validate_for(&self.ip_prefix)?;
        Ok((self.ip_prefix.network(), range))
    }
}

/// Destination prefix match: either one prefix or a named prefix set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixMatchInfo {
    #[serde(default)]
    pub prefix_set: Option<String>,
    #[serde(default)]
    pub prefix: Option<PrefixSpec>,
}

/// Type-specific condition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Candidate's source protocol equals `protocol`.
    ProtocolMatch { protocol: String },
    /// Candidate's destination falls under a prefix entry.
    DstIpPrefixMatch(PrefixMatchInfo),
}

impl ConditionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionKind::ProtocolMatch { .. } => "protocol_match",
            ConditionKind::DstIpPrefixMatch(_) => "dst_ip_prefix_match",
        }
    }
}

/// Condition definition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub name: String,
    pub condition: ConditionKind,
}

impl ConditionConfig {
    pub fn protocol(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: ConditionKind::ProtocolMatch {
                protocol: protocol.into(),
            },
        }
    }

    pub fn prefix(name: impl Into<String>, ip_prefix: IpPrefix, masklength_range: &str) -> Self {
        Self {
            name: name.into(),
            condition: ConditionKind::DstIpPrefixMatch(PrefixMatchInfo {
                prefix_set: None,
                prefix: Some(PrefixSpec::new(ip_prefix, masklength_range)),
            }),
        }
    }

    pub fn prefix_set(name: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: ConditionKind::DstIpPrefixMatch(PrefixMatchInfo {
                prefix_set: Some(set.into()),
                prefix: None,
            }),
        }
    }
}

/// Validated, ready-to-index form of a condition payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionMatcher {
    Protocol(String),
    Prefix { prefix: IpPrefix, range: MaskRange },
    PrefixSet(String),
}

impl ConditionMatcher {
    /// Validates a configured payload.
    ///
    /// Prefix-set existence is checked by the engine, which owns the set
    /// registry.
    pub fn from_config(config: &ConditionConfig) -> Result<Self> {
        match &config.condition {
            ConditionKind::ProtocolMatch { protocol } => {
                if protocol.is_empty() {
                    return Err(PolicyError::invalid_condition(
                        &config.name,
                        "protocol must not be empty",
                    ));
                }
                Ok(ConditionMatcher::Protocol(protocol.clone()))
            }
            ConditionKind::DstIpPrefixMatch(info) => match (&info.prefix_set, &info.prefix) {
                (Some(set), None) => Ok(ConditionMatcher::PrefixSet(set.clone())),
                (None, Some(spec)) => {
                    let (prefix, range) = spec.resolve()?;
                    Ok(ConditionMatcher::Prefix { prefix, range })
                }
                (Some(_), Some(_)) => Err(PolicyError::invalid_condition(
                    &config.name,
                    "set either prefix or prefix_set, not both",
                )),
                (None, None) => Err(PolicyError::invalid_condition(
                    &config.name,
                    "prefix match needs a prefix or a prefix_set",
                )),
            },
        }
    }
}

/// A registered condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCondition {
    pub name: String,
    pub kind: ConditionKind,
    pub matcher: ConditionMatcher,
    /// Statements using this condition.
    pub statements: Vec<String>,
}

impl HasBackRefs for PolicyCondition {
    fn back_refs(&self) -> &[String] {
        &self.statements
    }

    fn back_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.statements
    }
}

/// Prefix set definition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSetConfig {
    pub name: String,
    pub prefixes: Vec<PrefixSpec>,
}

/// A registered prefix set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixSet {
    pub name: String,
    pub members: Vec<(IpPrefix, MaskRange)>,
    /// Conditions naming this set.
    pub conditions: Vec<String>,
}

impl PrefixSet {
    pub fn from_config(config: &PrefixSetConfig) -> Result<Self> {
        let members = config
            .prefixes
            .iter()
            .map(PrefixSpec::resolve)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: config.name.clone(),
            members,
            conditions: Vec::new(),
        })
    }
}

impl HasBackRefs for PrefixSet {
    fn back_refs(&self) -> &[String] {
        &self.conditions
    }

    fn back_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.conditions
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
    fn test_prefix_matcher_normalizes_prefix() {
        let cfg = ConditionConfig::prefix("c", pfx("10.1.2.3/8"), "16..24");
        assert_eq!(
            ConditionMatcher::from_config(&cfg).unwrap(),
            ConditionMatcher::Prefix {
                prefix: pfx("10.0.0.0/8"),
                range: MaskRange::Range { low: 16, high: 24 },
            }
        );
    }

    #[test]
    fn test_prefix_matcher_rejects_bad_range() {
        let cfg = ConditionConfig::prefix("c", pfx("10.0.0.0/8"), "16-24");
        assert!(matches!(
            ConditionMatcher::from_config(&cfg),
            Err(PolicyError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_prefix_matcher_needs_exactly_one_source() {
        let mut cfg = ConditionConfig::prefix_set("c", "set1");
        if let ConditionKind::DstIpPrefixMatch(info) = &mut cfg.condition {
            info.prefix = Some(PrefixSpec::new(pfx("10.0.0.0/8"), "exact"));
        }
        assert!(matches!(
            ConditionMatcher::from_config(&cfg),
            Err(PolicyError::InvalidCondition { .. })
        ));

        let empty = ConditionConfig {
            name: "c".to_string(),
            condition: ConditionKind::DstIpPrefixMatch(PrefixMatchInfo::default()),
        };
        assert!(ConditionMatcher::from_config(&empty).is_err());
    }

    #[test]
    fn test_prefix_set_resolves_members() {
        let cfg = PrefixSetConfig {
            name: "rfc1918".to_string(),
            prefixes: vec![
                PrefixSpec::new(pfx("10.0.0.0/8"), "8..32"),
                PrefixSpec::new(pfx("192.168.0.0/16"), "exact"),
            ],
        };
        let set = PrefixSet::from_config(&cfg).unwrap();
        assert_eq!(set.members.len(), 2);
        assert_eq!(set.members[1], (pfx("192.168.0.0/16"), MaskRange::Exact));
    }

    #[test]
    fn test_condition_kind_type_name() {
        assert_eq!(
            ConditionConfig::protocol("c", "BGP").condition.type_name(),
            "protocol_match"
        );
    }
}
