//! Prefix -> match entry index.
//!
//! Keyed prefixes live in per-family tree bitmaps, which hold only the key
//! length. The typed [`PrefixMatchEntry`] lists live beside them in an
//! ordered map, one entry per (statement, condition) attachment, so the
//! lists are edited in place and never moved through the trie.
//! A lookup for a destination walks every keyed prefix that covers it,
//! longest first, and keeps the entries whose mask range admits the
//! destination length.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use sonic_types::{IpAddress, IpPrefix};
use tracing::debug;
use treebitmap::IpLookupTable;

use crate::types::{ConfigOp, MaskRange};

/// One stored prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatchEntry {
    /// Keyed prefix (host bits cleared).
    pub prefix: IpPrefix,
    /// Statement the condition is attached to.
    pub statement: String,
    /// Condition that produced the entry.
    pub condition: String,
    pub range: MaskRange,
}

impl PrefixMatchEntry {
    pub fn new(
        prefix: IpPrefix,
        range: MaskRange,
        statement: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.network(),
            statement: statement.into(),
            condition: condition.into(),
            range,
        }
    }

    pub fn matches(&self, dest: &IpPrefix) -> bool {
        self.range.matches(&self.prefix, dest)
    }

    fn is_owned_by(&self, statement: &str, condition: &str) -> bool {
        self.statement == statement && self.condition == condition
    }
}

/// Longest-prefix capable index of [`PrefixMatchEntry`] lists.
pub struct PrefixIndex {
    v4: IpLookupTable<Ipv4Addr, u8>,
    v6: IpLookupTable<Ipv6Addr, u8>,
    /// Number of keys per prefix length, per family.
    v4_lengths: BTreeMap<u8, usize>,
    v6_lengths: BTreeMap<u8, usize>,
    buckets: BTreeMap<IpPrefix, Vec<PrefixMatchEntry>>,
    entry_count: usize,
}

impl fmt::Debug for PrefixIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixIndex")
            .field("key_count", &self.buckets.len())
            .field("entry_count", &self.entry_count)
            .finish()
    }
}

impl Default for PrefixIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self {
            v4: IpLookupTable::new(),
            v6: IpLookupTable::new(),
            v4_lengths: BTreeMap::new(),
            v6_lengths: BTreeMap::new(),
            buckets: BTreeMap::new(),
            entry_count: 0,
        }
    }

    /// Number of distinct keyed prefixes.
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries across all keys.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Adds or removes the entry owned by (`statement`, `condition`) at
    /// `prefix`. Returns false when a delete found nothing.
    pub fn update(
        &mut self,
        prefix: &IpPrefix,
        range: MaskRange,
        statement: &str,
        condition: &str,
        op: ConfigOp,
    ) -> bool {
        debug!(%prefix, %range, statement, condition, %op, "update prefix index");
        match op {
            ConfigOp::Add => {
                self.insert(PrefixMatchEntry::new(*prefix, range, statement, condition));
                true
            }
            ConfigOp::Delete => self.remove(prefix, statement, condition),
        }
    }

    pub fn insert(&mut self, entry: PrefixMatchEntry) {
        let key = entry.prefix;
        if !self.buckets.contains_key(&key) {
            self.add_key(&key);
        }
        self.buckets.entry(key).or_default().push(entry);
        self.entry_count += 1;
    }

    /// Removes the first entry at `prefix` owned by (`statement`, `condition`).
    ///
    /// The key itself is dropped once its list is empty.
    pub fn remove(&mut self, prefix: &IpPrefix, statement: &str, condition: &str) -> bool {
        let key = prefix.network();
        let Some(list) = self.buckets.get_mut(&key) else {
            debug!(%key, "no entries for prefix, nothing to delete");
            return false;
        };

        let removed = match list.iter().position(|e| e.is_owned_by(statement, condition)) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        };
        if removed {
            self.entry_count -= 1;
        }

        if list.is_empty() {
            self.buckets.remove(&key);
            self.drop_key(&key);
        }
        removed
    }

    /// Entries stored exactly at `prefix`.
    pub fn entries(&self, prefix: &IpPrefix) -> &[PrefixMatchEntry] {
        self.buckets
            .get(&prefix.network())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Longest keyed prefix covering `dest`, with its entries.
    ///
    /// Mask ranges are not applied here; see [`PrefixIndex::lookup`].
    pub fn longest_match(&self, dest: &IpPrefix) -> Option<(IpPrefix, &[PrefixMatchEntry])> {
        // The trie matches on the address alone, so its answer may be a
        // key longer than `dest`; only then fall back to the length walk.
        let key = match self.trie_longest_match(dest.address())? {
            key if key.prefix_len() <= dest.prefix_len() => key,
            _ => self.covering_keys(dest).next()?,
        };
        self.buckets.get(&key).map(|list| (key, list.as_slice()))
    }

    /// Every entry, under any covering key, whose range admits `dest`.
    ///
    /// Entries come back longest key first, in insertion order per key.
    pub fn lookup(&self, dest: &IpPrefix) -> Vec<&PrefixMatchEntry> {
        let dest = *dest;
        self.covering_keys(&dest)
            .filter_map(|key| self.buckets.get(&key))
            .flat_map(|list| list.iter())
            .filter(|entry| entry.matches(&dest))
            .collect()
    }

    /// True if an entry owned by (`statement`, `condition`) admits `dest`.
    pub fn matches_owner(&self, dest: &IpPrefix, statement: &str, condition: &str) -> bool {
        self.lookup(dest)
            .into_iter()
            .any(|e| e.is_owned_by(statement, condition))
    }

    /// Keyed prefixes covering `dest`, longest first. Only lengths that
    /// hold at least one key are tried.
    fn covering_keys(&self, dest: &IpPrefix) -> impl Iterator<Item = IpPrefix> + '_ {
        let dest = *dest;
        let lengths = match dest.address() {
            IpAddress::V4(_) => &self.v4_lengths,
            IpAddress::V6(_) => &self.v6_lengths,
        };
        lengths
            .range(..=dest.prefix_len())
            .rev()
            .filter_map(move |(len, _)| dest.supernet(*len))
            .filter(move |key| self.buckets.contains_key(key))
    }

    fn trie_longest_match(&self, addr: &IpAddress) -> Option<IpPrefix> {
        let (network, len) = match addr {
            IpAddress::V4(addr) => self
                .v4
                .longest_match(addr.inner())
                .map(|(ip, _, len)| (IpAddress::from(ip), *len))?,
            IpAddress::V6(addr) => self
                .v6
                .longest_match(addr.inner())
                .map(|(ip, _, len)| (IpAddress::from(ip), *len))?,
        };
        IpPrefix::new(network, len).ok()
    }

    fn add_key(&mut self, key: &IpPrefix) {
        let len = key.prefix_len();
        match key.address() {
            IpAddress::V4(addr) => {
                self.v4.insert(addr.inner(), u32::from(len), len);
                *self.v4_lengths.entry(len).or_default() += 1;
            }
            IpAddress::V6(addr) => {
                self.v6.insert(addr.inner(), u32::from(len), len);
                *self.v6_lengths.entry(len).or_default() += 1;
            }
        }
    }

    fn drop_key(&mut self, key: &IpPrefix) {
        let len = key.prefix_len();
        let lengths = match key.address() {
            IpAddress::V4(addr) => {
                self.v4.remove(addr.inner(), u32::from(len));
                &mut self.v4_lengths
            }
            IpAddress::V6(addr) => {
                self.v6.remove(addr.inner(), u32::from(len));
                &mut self.v6_lengths
            }
        };
        if let Some(count) = lengths.get_mut(&len) {
            *count -= 1;
            if *count == 0 {
                lengths.remove(&len);
            }
        }
    }
}
