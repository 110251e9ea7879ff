//! Name Interning Tables
//!
//! Tag names are interned to small integers so buffer nodes and automaton
//! edges compare by id. Id 0 is reserved for the virtual document root.
//! Role identifiers get a parallel table so diagnostics can print names.

use std::collections::HashMap;
use std::fmt;

/// Interned tag name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u32);

impl TagId {
    /// The synthetic tag of the virtual document root
    pub const ROOT: TagId = TagId(0);

    #[inline]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

/// Marker meaning "some pending query operation still needs this node"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(pub u32);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Bidirectional, append-only `name <-> TagId` mapping
#[derive(Debug)]
pub struct TagTable {
    names: Vec<String>,
    index: HashMap<String, TagId>,
}

/// Name stored for the reserved root id
pub const ROOT_TAG_NAME: &str = "#root";

impl TagTable {
    pub fn new() -> Self {
        let mut table = TagTable {
            names: Vec::with_capacity(64),
            index: HashMap::with_capacity(64),
        };
        table.names.push(ROOT_TAG_NAME.to_string());
        table.index.insert(ROOT_TAG_NAME.to_string(), TagId::ROOT);
        table
    }

    /// Intern `name`, returning the existing id when already present
    pub fn intern(&mut self, name: &str) -> TagId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = TagId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// Look up without interning
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<TagId> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn name(&self, id: TagId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Number of interned names, the root included
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root entry is always present
        false
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of role ids handed out for one query run
#[derive(Debug, Default)]
pub struct RoleTable {
    names: Vec<String>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh role id with a descriptive label
    pub fn register(&mut self, label: &str) -> RoleId {
        let id = RoleId(self.names.len() as u32);
        self.names.push(label.to_string());
        id
    }

    pub fn label(&self, id: RoleId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
