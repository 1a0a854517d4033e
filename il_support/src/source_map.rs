//! File ids, source locations and the source text cache used to render
//! caret-annotated diagnostics.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A source location: file id plus 1-based line/column.
///
/// `file_id == 0` denotes an unregistered (synthetic) location, e.g. for
/// instructions synthesized by a transform pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceLoc {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const UNKNOWN: SourceLoc = SourceLoc { file_id: 0, line: 0, column: 0 };

    pub fn new(file_id: u32, line: u32, column: u32) -> Self {
        Self { file_id, line, column }
    }

    pub fn is_known(&self) -> bool {
        self.file_id != 0
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}:{}", self.file_id, self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

/// Registry mapping normalized file paths to stable file ids, retaining the
/// source text so diagnostics can render a single-line snippet with a caret.
#[derive(Debug, Default)]
pub struct SourceManager {
    paths: Vec<PathBuf>,
    texts: Vec<String>,
    by_path: HashMap<PathBuf, u32>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` with `text`, returning its stable file id. Re-adding
    /// the same normalized path returns the same id (text is updated).
    pub fn add_file(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> u32 {
        let normalized = normalize(path.as_ref());
        if let Some(&id) = self.by_path.get(&normalized) {
            self.texts[id as usize - 1] = text.into();
            return id;
        }
        self.paths.push(normalized.clone());
        self.texts.push(text.into());
        let id = self.paths.len() as u32; // 1-based; 0 is reserved for "unknown"
        self.by_path.insert(normalized, id);
        id
    }

    pub fn path(&self, file_id: u32) -> Option<&Path> {
        if file_id == 0 {
            return None;
        }
        self.paths.get(file_id as usize - 1).map(PathBuf::as_path)
    }

    pub fn text(&self, file_id: u32) -> Option<&str> {
        if file_id == 0 {
            return None;
        }
        self.texts.get(file_id as usize - 1).map(String::as_str)
    }

    /// Renders the single source line referenced by `loc`, or `None` if the
    /// location is unknown or out of range.
    pub fn line_text(&self, loc: SourceLoc) -> Option<&str> {
        let text = self.text(loc.file_id)?;
        text.lines().nth(loc.line.checked_sub(1)? as usize)
    }

    /// Renders a two-line `<line>\n<caret>` snippet for `loc`.
    pub fn render_snippet(&self, loc: SourceLoc) -> Option<String> {
        let line = self.line_text(loc)?;
        let col = loc.column.max(1) as usize;
        let mut caret = String::with_capacity(col);
        for _ in 1..col {
            caret.push(' ');
        }
        caret.push('^');
        Some(format!("{line}\n{caret}"))
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_reuses_file_id() {
        let mut sm = SourceManager::new();
        let a = sm.add_file("foo.bas", "10 PRINT 1\n20 END\n");
        let b = sm.add_file("foo.bas", "10 PRINT 1\n20 END\n");
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn snippet_has_caret_at_column() {
        let mut sm = SourceManager::new();
        let id = sm.add_file("foo.bas", "LET X = 1\n");
        let snippet = sm.render_snippet(SourceLoc::new(id, 1, 5)).unwrap();
        let mut lines = snippet.lines();
        assert_eq!(lines.next(), Some("LET X = 1"));
        assert_eq!(lines.next(), Some("    ^"));
    }

    #[test]
    fn unknown_location_has_no_snippet() {
        let sm = SourceManager::new();
        assert!(sm.render_snippet(SourceLoc::UNKNOWN).is_none());
    }
}
