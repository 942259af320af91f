//! Source locations (§3.1).
//!
//! A [`SourceLocation`] is attached to every AST node. The originating file path is shared via
//! [`FileId`], an `Rc<str>` handle: cloning a location (as happens constantly while rewriting
//! trees) never copies the underlying string.

use std::{fmt, rc::Rc};

/// Shared handle to an originating file path.
///
/// Two `FileId`s compare equal iff they point at the same underlying path string, regardless
/// of which `Rc` allocation produced them.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileId(Rc<str>);

impl FileId {
    #[must_use]
    pub fn new(path: impl Into<Rc<str>>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for FileId {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for FileId {}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in a source file, inclusive start / exclusive end, 1-indexed lines and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A span of source text, carrying the file it came from.
///
/// [`SourceLocation::file`] is `None` for synthetic nodes injected by a lowering pass (e.g. the
/// temporary variable a matrix-cast lowering hoists in front of the current statement); such
/// nodes inherit no single originating span.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    pub file: Option<FileId>,
    pub start: Position,
    pub end: Position,
}

impl SourceLocation {
    #[must_use]
    pub const fn new(file: Option<FileId>, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// A location with no file and zeroed positions, used by synthetic nodes a lowering pass
    /// injects (hoisted temporaries, unrolled-loop duplicates before remapping).
    #[must_use]
    pub fn synthetic() -> Self {
        Self::default()
    }

    /// Spans from `self`'s start to `other`'s end; used to build an enclosing location for a
    /// freshly constructed parent node out of two children's locations.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            file: self.file.clone().or_else(|| other.file.clone()),
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}:{}", self.start.line, self.start.column),
            None => write!(f, "<generated>:{}:{}", self.start.line, self.start.column),
        }
    }
}
