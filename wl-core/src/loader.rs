//! Source loading and import resolution.
//!
//! The loader reads the entry file, parses it, and walks its imports
//! depth first. `import Foo` resolves to `Foo.wl` next to the
//! importing file. Every file is read and parsed at most once; a file
//! is registered under its canonical path before its own imports are
//! visited, so import cycles terminate instead of recursing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Definition, ParsedFile};
use crate::diagnostic::{Diagnostic, codes};
use crate::error::CoreError;
use crate::lexer::lex;
use crate::parser::parse_file;
use crate::source::{FileId, Position, SourceMap};

pub struct Loader {
    sources: SourceMap,
    by_path: HashMap<PathBuf, FileId>,
    files: Vec<ParsedFile>,
}

impl Loader {
    pub fn new() -> Loader {
        Loader {
            sources: SourceMap::new(),
            by_path: HashMap::new(),
            files: Vec::new(),
        }
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    /// Load the entry file and, transitively, everything it imports.
    ///
    /// An unreadable entry file is an I/O error; an unreadable import
    /// is a diagnostic at the `import` line of the importing file.
    pub fn load_entry(&mut self, path: &Path) -> Result<FileId, CoreError> {
        let text = fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.load_text(path, text)?)
    }

    /// Load source text under a synthetic path. Used by the REPL and
    /// by tests; imports still resolve relative to `name`.
    pub fn load_source(&mut self, name: &str, text: &str) -> Result<FileId, Diagnostic> {
        self.load_text(Path::new(name), text.to_string())
    }

    /// Hand over everything loaded so far. File ids are dense, and the
    /// returned files are sorted so that `files[id]` is the file with
    /// that id.
    pub fn finish(self) -> (SourceMap, Vec<ParsedFile>) {
        let mut files = self.files;
        files.sort_by_key(|f| f.file.0);
        (self.sources, files)
    }

    /// Give the source map back without the parsed files, for
    /// rendering diagnostics after a failed load.
    pub fn into_sources(self) -> SourceMap {
        self.sources
    }

    fn load_text(&mut self, path: &Path, text: String) -> Result<FileId, Diagnostic> {
        let key = path_key(path);
        if let Some(&id) = self.by_path.get(&key) {
            return Ok(id);
        }
        let id = self.sources.add(path.to_path_buf(), text);
        self.by_path.insert(key, id);

        let tokens = lex(id, self.sources.text(id).unwrap_or_default())?;
        let mut parsed = parse_file(id, tokens)?;

        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for def in &mut parsed.defs {
            if let Definition::Import(import) = def {
                let target = dir.join(format!("{}.wl", import.name));
                import.target = Some(self.load_import(&target, import.name.as_str(), import.position)?);
            }
        }
        self.files.push(parsed);
        Ok(id)
    }

    fn load_import(
        &mut self,
        path: &Path,
        name: &str,
        position: Position,
    ) -> Result<FileId, Diagnostic> {
        if let Some(&id) = self.by_path.get(&path_key(path)) {
            return Ok(id);
        }
        let text = fs::read_to_string(path).map_err(|err| {
            Diagnostic::error(
                format!("failed to import `{}` ({}): {}", name, path.display(), err),
                position,
            )
            .with_code(codes::FILE_READ_FAILED)
        })?;
        self.load_text(path, text)
    }
}

impl Default for Loader {
    fn default() -> Loader {
        Loader::new()
    }
}

/// Canonicalize where possible so that two spellings of the same path
/// share one module. Falls back to the given path for sources that do
/// not exist on disk (REPL input, tests).
fn path_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).expect("write source file");
        path
    }

    #[test]
    fn loads_entry_and_imports() {
        let dir = TempDir::new().expect("tempdir");
        let main = write(&dir, "Main.wl", "import Lib\nfun main() int { return 0 }\n");
        write(&dir, "Lib.wl", "fun helper() int { return 1 }\n");

        let mut loader = Loader::new();
        let entry = loader.load_entry(&main).expect("load");
        let (sources, files) = loader.finish();
        assert_eq!(entry, FileId(0));
        assert_eq!(files.len(), 2);
        assert_eq!(sources.name(FileId(1)), "Lib.wl");
        // files[id] holds the file with that id
        for (i, f) in files.iter().enumerate() {
            assert_eq!(f.file.0 as usize, i);
        }
    }

    #[test]
    fn each_file_is_loaded_once() {
        // Main imports A and B; both import Shared.
        let dir = TempDir::new().expect("tempdir");
        let main = write(&dir, "Main.wl", "import A\nimport B\n");
        write(&dir, "A.wl", "import Shared\n");
        write(&dir, "B.wl", "import Shared\n");
        write(&dir, "Shared.wl", "struct S { x int }\n");

        let mut loader = Loader::new();
        loader.load_entry(&main).expect("load");
        let (_, files) = loader.finish();
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn import_cycles_terminate() {
        let dir = TempDir::new().expect("tempdir");
        let a = write(&dir, "A.wl", "import B\n");
        write(&dir, "B.wl", "import A\n");

        let mut loader = Loader::new();
        let entry = loader.load_entry(&a).expect("load");
        let (_, files) = loader.finish();
        assert_eq!(files.len(), 2);

        // B's import points back at the entry file.
        let Definition::Import(import) = &files[1].defs[0] else {
            panic!("expected an import definition");
        };
        assert_eq!(import.target, Some(entry));
    }

    #[test]
    fn missing_import_is_a_diagnostic_at_the_import_line() {
        let dir = TempDir::new().expect("tempdir");
        let main = write(&dir, "Main.wl", "\nimport Nope\n");

        let mut loader = Loader::new();
        let err = loader.load_entry(&main).unwrap_err();
        let CoreError::Diagnostic(diag) = err else {
            panic!("expected a diagnostic, got {err:?}");
        };
        assert_eq!(diag.code, Some(codes::FILE_READ_FAILED));
        assert_eq!(diag.position.line, 2);
        assert_eq!(
            diag.render(loader.sources()).split(':').next(),
            Some("Main.wl")
        );
    }

    #[test]
    fn missing_entry_is_an_io_error() {
        let mut loader = Loader::new();
        let err = loader.load_entry(Path::new("/nonexistent/Main.wl")).unwrap_err();
        assert!(matches!(err, CoreError::SourceIo { .. }));
    }

    #[test]
    fn load_source_parses_without_touching_disk() {
        let mut loader = Loader::new();
        let id = loader
            .load_source("<repl>", "fun f() int { return 3 }\n")
            .expect("load");
        assert_eq!(id, FileId(0));
    }
}
