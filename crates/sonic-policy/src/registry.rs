//! Name-keyed registries with back-reference tracking.
//!
//! A [`Registry`] never creates entries implicitly: lookups return
//! `Option`, and back-reference updates on a missing key fail instead of
//! materialising a default record. Back-references answer "what depends on
//! me" for every definition (statements using a condition, policies using a
//! statement, ...).

use std::collections::BTreeMap;

use crate::error::{ObjectKind, PolicyError, Result};
use crate::types::ConfigOp;

/// Records that keep a list of dependent object names.
pub trait HasBackRefs {
    fn back_refs(&self) -> &[String];

    fn back_refs_mut(&mut self) -> &mut Vec<String>;
}

/// Appends or removes `name` in a back-reference list.
///
/// Delete removes the first equal entry only, so a dependent registered
/// twice needs two deletes. Returns false if a delete found nothing.
pub fn update_ref_list(list: &mut Vec<String>, name: &str, op: ConfigOp) -> bool {
    match op {
        ConfigOp::Add => {
            list.push(name.to_string());
            true
        }
        ConfigOp::Delete => match list.iter().position(|n| n == name) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        },
    }
}

/// A name-keyed store of one kind of definition.
#[derive(Debug, Clone)]
pub struct Registry<V> {
    kind: ObjectKind,
    inner: BTreeMap<String, V>,
}

impl<V> Registry<V> {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            inner: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// **This never creates entries.**
    pub fn get(&self, name: &str) -> Option<&V> {
        self.inner.get(name)
    }

    /// **This never creates entries.**
    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.inner.get_mut(name)
    }

    /// Like [`Registry::get`] but reports a missing key as `NotFound`.
    pub fn lookup(&self, name: &str) -> Result<&V> {
        self.inner
            .get(name)
            .ok_or_else(|| PolicyError::not_found(self.kind, name))
    }

    /// Fails with `DuplicateName` unless `name` is new.
    pub fn ensure_absent(&self, name: &str) -> Result<()> {
        if self.inner.contains_key(name) {
            return Err(PolicyError::duplicate(self.kind, name));
        }
        Ok(())
    }

    /// Inserts a new definition; existing keys are never overwritten.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Result<()> {
        let name = name.into();
        self.ensure_absent(&name)?;
        self.inner.insert(name, value);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<V> {
        self.inner
            .remove(name)
            .ok_or_else(|| PolicyError::not_found(self.kind, name))
    }

    /// Iterates definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.inner.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.inner.keys()
    }
}

impl<V: HasBackRefs> Registry<V> {
    /// Adds or removes `user` from the back-references of `name`.
    ///
    /// Returns false when a delete did not find `user`.
    pub fn update_back_ref(&mut self, name: &str, user: &str, op: ConfigOp) -> Result<bool> {
        let kind = self.kind;
        let entry = self
            .inner
            .get_mut(name)
            .ok_or_else(|| PolicyError::not_found(kind, name))?;
        Ok(update_ref_list(entry.back_refs_mut(), user, op))
    }

    /// Returns the dependents of `name`, or `None` if it is not registered.
    pub fn back_refs(&self, name: &str) -> Option<&[String]> {
        self.inner.get(name).map(|v| v.back_refs())
    }

    /// Fails with `InUse` if anything still depends on `name`.
    pub fn ensure_unreferenced(&self, name: &str) -> Result<()> {
        let entry = self.lookup(name)?;
        if !entry.back_refs().is_empty() {
            return Err(PolicyError::in_use(self.kind, name, entry.back_refs()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Def {
        users: Vec<String>,
    }

    impl HasBackRefs for Def {
        fn back_refs(&self) -> &[String] {
            &self.users
        }

        fn back_refs_mut(&mut self) -> &mut Vec<String> {
            &mut self.users
        }
    }

    #[test]
    fn test_get_never_creates() {
        let mut reg: Registry<Def> = Registry::new(ObjectKind::Condition);
        assert!(reg.get("missing").is_none());
        assert!(reg.get_mut("missing").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut reg: Registry<Def> = Registry::new(ObjectKind::Action);
        reg.insert("permit", Def::default()).unwrap();
        assert_eq!(
            reg.insert("permit", Def::default()),
            Err(PolicyError::duplicate(ObjectKind::Action, "permit"))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_back_ref_requires_existing_key() {
        let mut reg: Registry<Def> = Registry::new(ObjectKind::Condition);
        assert_eq!(
            reg.update_back_ref("cond", "stmt1", ConfigOp::Add),
            Err(PolicyError::not_found(ObjectKind::Condition, "cond"))
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_back_ref_add_and_delete() {
        let mut reg: Registry<Def> = Registry::new(ObjectKind::Condition);
        reg.insert("cond", Def::default()).unwrap();

        reg.update_back_ref("cond", "s1", ConfigOp::Add).unwrap();
        reg.update_back_ref("cond", "s2", ConfigOp::Add).unwrap();
        assert_eq!(reg.back_refs("cond").unwrap(), &["s1", "s2"]);
        assert!(reg.ensure_unreferenced("cond").is_err());

        assert!(reg.update_back_ref("cond", "s1", ConfigOp::Delete).unwrap());
        assert!(!reg.update_back_ref("cond", "s1", ConfigOp::Delete).unwrap());
        assert_eq!(reg.back_refs("cond").unwrap(), &["s2"]);

        reg.update_back_ref("cond", "s2", ConfigOp::Delete).unwrap();
        assert!(reg.ensure_unreferenced("cond").is_ok());
    }

    #[test]
    fn test_update_ref_list_removes_first_match_only() {
        let mut list = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert!(update_ref_list(&mut list, "a", ConfigOp::Delete));
        assert_eq!(list, vec!["b", "a"]);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut reg: Registry<Def> = Registry::new(ObjectKind::Policy);
        assert_eq!(
            reg.remove("pol").unwrap_err(),
            PolicyError::not_found(ObjectKind::Policy, "pol")
        );
    }
}
