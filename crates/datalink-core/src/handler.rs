//! The handler capability and its building blocks.
//!
//! A [`DataLinkHandler`] owns a set of API names. The registry asks each
//! handler in order whether it claims a name; the first one that does
//! supplies the [`ApiEntry`]. [`EntryTable`] is the usual backing store
//! for a handler, and [`CompoundHandler`] groups an ordered sub-chain
//! behind a single registration.

use std::collections::BTreeMap;

use crate::api::ApiEntry;
use crate::error::RegistryError;

/// A component that owns one or more API names.
pub trait DataLinkHandler: Send + Sync {
    /// The entry for `name`, if this handler owns it.
    fn entry(&self, name: &str) -> Option<&ApiEntry>;

    /// Whether this handler owns `name`.
    fn claims(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Append every entry this handler owns, in its own order.
    fn append_entries<'a>(&'a self, out: &mut Vec<&'a ApiEntry>);
}

/// Name-indexed set of entries with duplicate detection.
#[derive(Debug, Default)]
pub struct EntryTable {
    entries: BTreeMap<String, ApiEntry>,
}

impl EntryTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add an entry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateEntry`] if the name is taken.
    pub fn register(&mut self, entry: ApiEntry) -> Result<(), RegistryError> {
        if self.entries.contains_key(entry.name()) {
            return Err(RegistryError::DuplicateEntry {
                name: entry.name().to_owned(),
            });
        }
        self.entries.insert(entry.name().to_owned(), entry);
        Ok(())
    }

    /// Add several entries, stopping at the first duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateEntry`] if any name is taken.
    pub fn register_all(
        &mut self,
        entries: impl IntoIterator<Item = ApiEntry>,
    ) -> Result<(), RegistryError> {
        for entry in entries {
            self.register(entry)?;
        }
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DataLinkHandler for EntryTable {
    fn entry(&self, name: &str) -> Option<&ApiEntry> {
        self.entries.get(name)
    }

    fn append_entries<'a>(&'a self, out: &mut Vec<&'a ApiEntry>) {
        out.extend(self.entries.values());
    }
}

/// An ordered sub-chain presented to the outer chain as one handler.
///
/// Resolution inside the group follows the group's own order, so nesting
/// never reorders names across groups.
#[derive(Default)]
pub struct CompoundHandler {
    handlers: Vec<Box<dyn DataLinkHandler>>,
}

impl CompoundHandler {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the end of the group.
    pub fn push(&mut self, handler: impl DataLinkHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, handler: impl DataLinkHandler + 'static) -> Self {
        self.push(handler);
        self
    }

    /// Number of handlers in the group.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the group has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl DataLinkHandler for CompoundHandler {
    fn entry(&self, name: &str) -> Option<&ApiEntry> {
        self.handlers.iter().find_map(|h| h.entry(name))
    }

    fn append_entries<'a>(&'a self, out: &mut Vec<&'a ApiEntry>) {
        for handler in &self.handlers {
            handler.append_entries(out);
        }
    }
}
