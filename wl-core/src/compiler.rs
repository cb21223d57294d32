//! Compiler orchestration: load, check, lower, generate.
//!
//! The `Compiler` keeps the source map alive across a failed run so
//! the driver can still render diagnostics with filenames.

use std::path::Path;

use crate::check::check;
use crate::codegen_c::generate;
use crate::error::CoreError;
use crate::loader::Loader;
use crate::lower::lower;
use crate::source::SourceMap;

pub struct Compiler {
    sources: SourceMap,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            sources: SourceMap::new(),
        }
    }

    /// Sources of the most recent run, successful or not.
    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    /// Compile the entry file and everything it imports into C text.
    pub fn compile_file(&mut self, path: &Path) -> Result<String, CoreError> {
        let mut loader = Loader::new();
        let entry = match loader.load_entry(path) {
            Ok(entry) => entry,
            Err(err) => {
                self.sources = loader.into_sources();
                return Err(err);
            }
        };
        let (sources, files) = loader.finish();
        self.sources = sources;

        let mut program = check(entry, &files)?;
        lower(&mut program);
        Ok(generate(&program, &self.sources))
    }

    /// Compile source text directly, without touching disk. Imports
    /// still resolve relative to `name`.
    pub fn compile_source(&mut self, name: &str, text: &str) -> Result<String, CoreError> {
        let mut loader = Loader::new();
        let entry = match loader.load_source(name, text) {
            Ok(entry) => entry,
            Err(diag) => {
                self.sources = loader.into_sources();
                return Err(diag.into());
            }
        };
        let (sources, files) = loader.finish();
        self.sources = sources;

        let mut program = check(entry, &files)?;
        lower(&mut program);
        Ok(generate(&program, &self.sources))
    }

    /// Render an error for the driver: diagnostics get filename and
    /// line, I/O errors speak for themselves.
    pub fn render(&self, err: &CoreError) -> String {
        match err {
            CoreError::Diagnostic(diag) => diag.render(&self.sources),
            other => other.to_string(),
        }
    }
}

impl Default for Compiler {
    fn default() -> Compiler {
        Compiler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_source_to_c() {
        let mut compiler = Compiler::new();
        let output = compiler
            .compile_source("main.wl", "fun main() int { return 0 }\n")
            .expect("compile");
        assert!(output.contains("int64_t main(void)"));
        assert!(output.contains("return 0;"));
    }

    #[test]
    fn compiles_a_cyclic_import_pair_from_disk() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("A.wl"), "import B\nfun a() {}\n").expect("write");
        std::fs::write(dir.path().join("B.wl"), "import A\nfun b() {}\n").expect("write");

        let mut compiler = Compiler::new();
        let output = compiler
            .compile_file(&dir.path().join("A.wl"))
            .expect("compile");
        assert!(output.contains("void wl_A_a(void)"));
        assert!(output.contains("void wl_B_b(void)"));
    }

    #[test]
    fn missing_entry_file_is_an_io_error() {
        let mut compiler = Compiler::new();
        let err = compiler
            .compile_file(std::path::Path::new("/nonexistent/Main.wl"))
            .unwrap_err();
        assert!(compiler.render(&err).contains("failed to read source"));
    }

    #[test]
    fn diagnostics_render_with_the_synthetic_filename() {
        let mut compiler = Compiler::new();
        let err = compiler
            .compile_source("main.wl", "fun f() int {\nreturn y }\n")
            .unwrap_err();
        assert_eq!(
            compiler.render(&err),
            "main.wl:2: error: undeclared identifier `y`"
        );
    }
}
