//! Source file identifiers and positions.
//!
//! Every token and AST node carries a `Position` so that later
//! phases can report errors against the original source. Positions
//! are line-based; the mapping from `FileId` to a path is kept in a
//! `SourceMap` owned by the loader.

use std::path::{Path, PathBuf};

/// Identifier for a source file.
///
/// Assigned incrementally as files are loaded. A `FileId` also
/// serves as the identity of the module built from that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A source location: file plus 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub file: FileId,
    pub line: u32,
}

impl Position {
    pub fn new(file: FileId, line: u32) -> Position {
        Position { file, line }
    }
}

/// Holds the paths and contents of all loaded sources, keyed by
/// their assigned `FileId`.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<(PathBuf, String)>,
}

impl SourceMap {
    pub fn new() -> SourceMap {
        SourceMap { files: Vec::new() }
    }

    pub fn add(&mut self, path: PathBuf, text: String) -> FileId {
        let id = self.files.len() as u32;
        self.files.push((path, text));
        FileId(id)
    }

    pub fn path(&self, id: FileId) -> Option<&Path> {
        self.files.get(id.0 as usize).map(|(p, _)| p.as_path())
    }

    pub fn text(&self, id: FileId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|(_, t)| t.as_str())
    }

    /// Display name used in diagnostics: the file name without its
    /// directory. Falls back to a synthetic name for positions that
    /// escaped registration.
    pub fn name(&self, id: FileId) -> String {
        match self.path(id) {
            Some(p) => match p.file_name() {
                Some(n) => n.to_string_lossy().into_owned(),
                None => p.display().to_string(),
            },
            None => format!("<file {}>", id.0),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_dense_file_ids() {
        let mut sm = SourceMap::new();
        let a = sm.add(PathBuf::from("a.wl"), String::new());
        let b = sm.add(PathBuf::from("b.wl"), String::new());
        assert_eq!(a, FileId(0));
        assert_eq!(b, FileId(1));
        assert_eq!(sm.name(b), "b.wl");
    }

    #[test]
    fn unknown_file_gets_synthetic_name() {
        let sm = SourceMap::new();
        assert_eq!(sm.name(FileId(7)), "<file 7>");
    }
}
