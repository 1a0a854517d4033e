//! Deterministic block labels (§4.9.2): a per-procedure counter keyed by
//! a naming hint, producing labels like `if_then.0`, `for.body.1`.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct BlockNamer {
    counts: HashMap<&'static str, u32>,
}

impl BlockNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unique label for `hint`, e.g. `name(hint) ==
    /// "if_then.0"` then `"if_then.1"` on the next call with the same hint.
    pub fn name(&mut self, hint: &'static str) -> String {
        let n = self.counts.entry(hint).or_insert(0);
        let label = format!("{hint}.{n}");
        *n += 1;
        label
    }
}
