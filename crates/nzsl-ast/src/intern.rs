//! String interning for the binary module codec's string table (§4.J/§6.3).
//!
//! This is deliberately separate from the `Rc<str>` handles used by [`crate::location::FileId`]:
//! a source location's file handle is a cheap-clone in-memory pointer shared across every node
//! parsed from the same file, while the interner below exists only for the on-disk encoding,
//! where the writer must assign each unique string a stable index the reader can look back up.
//! Conflating the two would make `SourceLocation` depend on a module's interner outliving the
//! nodes that reference it; keeping them apart means a node tree can be cloned, dropped, or
//! reparented without ever touching string storage.

use ahash::AHashMap;

/// Index into an [`InternerBuilder`]'s (or [`Interns`]'s) string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Write-side interner: assigns each unique string the next free index, in first-seen order.
#[derive(Debug, Default)]
pub struct InternerBuilder {
    lookup: AHashMap<String, StringId>,
    strings: Vec<String>,
}

impl InternerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning its stable index. Subsequent calls with an equal string return
    /// the same index without growing the table.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("more than u32::MAX unique strings in one module"));
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    /// Consumes the builder, returning the strings in index order for the writer to emit.
    #[must_use]
    pub fn into_table(self) -> Vec<String> {
        self.strings
    }
}

/// Read-side table: strings in index order, as written by [`InternerBuilder::into_table`].
#[derive(Debug, Clone, Default)]
pub struct Interns {
    strings: Vec<String>,
}

impl Interns {
    #[must_use]
    pub fn from_table(strings: Vec<String>) -> Self {
        Self { strings }
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut builder = InternerBuilder::new();
        let a = builder.intern("foo");
        let b = builder.intern("bar");
        let c = builder.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(builder.into_table(), vec!["foo".to_owned(), "bar".to_owned()]);
    }

    #[test]
    fn round_trip() {
        let mut builder = InternerBuilder::new();
        let a = builder.intern("alpha");
        let b = builder.intern("beta");
        let interns = Interns::from_table(builder.into_table());
        assert_eq!(interns.resolve(a), "alpha");
        assert_eq!(interns.resolve(b), "beta");
    }
}
