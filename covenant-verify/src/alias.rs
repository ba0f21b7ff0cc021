#![forbid(unsafe_code)]
#![allow(unused_assignments)]

//! Versioned variable names: every write gets a fresh solver symbol.

use std::collections::BTreeMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::term::{Sort, Term};

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
#[allow(unused_assignments)]
pub enum AliasError {
    #[error("variable `{0}` is already registered")]
    #[diagnostic(code(covenant::verify))]
    AlreadyRegistered(String),
    #[error("variable `{0}` is not registered")]
    #[diagnostic(code(covenant::verify))]
    Unregistered(String),
}

/// One instance in time of a variable, named `key_version` in the solver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Alias {
    pub key: String,
    pub version: u32,
    pub sort: Sort,
}

impl Alias {
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn term(&self) -> Term {
        Term::var(self.name(), self.sort)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.key, self.version)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    version: u32,
    sort: Sort,
}

/// Current version of every variable written so far in one call sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    slots: BTreeMap<String, Slot>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn alias(key: &str, slot: Slot) -> Alias {
        Alias {
            key: key.to_string(),
            version: slot.version,
            sort: slot.sort,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn add_variable(&mut self, key: &str, sort: Sort) -> Result<Alias, AliasError> {
        if self.slots.contains_key(key) {
            return Err(AliasError::AlreadyRegistered(key.to_string()));
        }
        let slot = Slot { version: 0, sort };
        self.slots.insert(key.to_string(), slot);
        Ok(Self::alias(key, slot))
    }

    /// Version 0 for a new variable, the next version otherwise.
    pub fn add_or_increment(&mut self, key: &str, sort: Sort) -> Alias {
        let slot = self
            .slots
            .entry(key.to_string())
            .and_modify(|s| s.version += 1)
            .or_insert(Slot { version: 0, sort });
        Self::alias(key, *slot)
    }

    pub fn get_alias(&self, key: &str) -> Result<Alias, AliasError> {
        self.slots
            .get(key)
            .map(|slot| Self::alias(key, *slot))
            .ok_or_else(|| AliasError::Unregistered(key.to_string()))
    }

    pub fn increment_alias(&mut self, key: &str) -> Result<Alias, AliasError> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| AliasError::Unregistered(key.to_string()))?;
        slot.version += 1;
        Ok(Self::alias(key, *slot))
    }

    /// Current alias, registering an unconstrained version 0 on first read.
    pub fn read(&mut self, key: &str, sort: Sort) -> Alias {
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert(Slot { version: 0, sort });
        Self::alias(key, *slot)
    }

    /// Variables registered here but unknown to `other`, at this table's version.
    pub fn alias_difference(&self, other: &AliasTable) -> Vec<Alias> {
        self.slots
            .iter()
            .filter(|(key, _)| !other.slots.contains_key(*key))
            .map(|(key, slot)| Self::alias(key, *slot))
            .collect()
    }

    /// For every variable known to both tables whose versions disagree, moves
    /// this table to a version newer than both and reports it. Variables only
    /// `other` knows are left alone.
    pub fn merge(&mut self, other: &AliasTable) -> Vec<Alias> {
        let mut updated = Vec::new();
        for (key, slot) in self.slots.iter_mut() {
            if let Some(theirs) = other.slots.get(key) {
                if theirs.version != slot.version {
                    slot.version = slot.version.max(theirs.version) + 1;
                    updated.push(Self::alias(key, *slot));
                }
            }
        }
        updated
    }

    /// Adopts `alias` as the current version of its variable.
    pub(crate) fn insert(&mut self, alias: &Alias) {
        self.slots.insert(
            alias.key.clone(),
            Slot {
                version: alias.version,
                sort: alias.sort,
            },
        );
    }

    pub fn aliases(&self) -> impl Iterator<Item = Alias> + '_ {
        self.slots.iter().map(|(key, slot)| Self::alias(key, *slot))
    }
}
