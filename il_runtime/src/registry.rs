//! The canonical runtime helper table: name -> signature, categorized by
//! facility, built once and shared read-only (§4.2, §9 "global mutable
//! state").

use std::sync::OnceLock;

use il_core::Type;

use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Strings,
    Arrays,
    Math,
    FileIo,
    Terminal,
    Rng,
    Trap,
}

/// Whether a helper may be constant-folded or hoisted by LICM. File I/O,
/// terminal I/O, allocation and RNG helpers are effectful; math/string
/// helpers with no observable state are pure (§9 open question: derived
/// here rather than fully enumerated by the spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Pure,
    Effectful,
}

#[derive(Debug, Clone)]
pub struct HelperEntry {
    pub name: &'static str,
    pub signature: Signature,
    pub facility: Facility,
    pub effect: Effect,
}

/// `(name, compact signature spelling, facility, effect)` rows. The
/// compact spellings are parsed once at registry construction.
const RAW_TABLE: &[(&str, &str, Facility, Effect)] = &[
    // Strings: allocation/retain/release, concatenation, comparison.
    ("rt_str_alloc", "str(i64)", Facility::Strings, Effect::Effectful),
    ("rt_str_retain", "void(str)", Facility::Strings, Effect::Effectful),
    ("rt_str_release", "void(str)", Facility::Strings, Effect::Effectful),
    ("rt_concat", "str(str,str)", Facility::Strings, Effect::Pure),
    ("rt_str_eq", "i1(str,str)", Facility::Strings, Effect::Pure),
    ("rt_str_cmp", "i64(str,str)", Facility::Strings, Effect::Pure),
    ("rt_str_len", "i64(str)", Facility::Strings, Effect::Pure),
    ("rt_str_to_int", "i64(str)", Facility::Strings, Effect::Pure),
    ("rt_str_to_float", "f64(str)", Facility::Strings, Effect::Pure),
    ("rt_int_to_str", "str(i64)", Facility::Strings, Effect::Pure),
    ("rt_float_to_str", "str(f64)", Facility::Strings, Effect::Pure),
    // Arrays: allocation and bounds-checked element access.
    ("rt_arr_alloc_i64", "ptr(i64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_get_i64", "i64(ptr,i64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_set_i64", "void(ptr,i64,i64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_alloc_f64", "ptr(i64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_get_f64", "f64(ptr,i64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_set_f64", "void(ptr,i64,f64)", Facility::Arrays, Effect::Effectful),
    ("rt_arr_len", "i64(ptr)", Facility::Arrays, Effect::Pure),
    // Math.
    ("rt_abs_i64", "i64(i64)", Facility::Math, Effect::Pure),
    ("rt_abs_f64", "f64(f64)", Facility::Math, Effect::Pure),
    ("rt_floor", "f64(f64)", Facility::Math, Effect::Pure),
    ("rt_ceil", "f64(f64)", Facility::Math, Effect::Pure),
    ("rt_sqr", "f64(f64)", Facility::Math, Effect::Pure),
    ("rt_pow", "f64(f64,f64)", Facility::Math, Effect::Pure),
    ("rt_sin", "f64(f64)", Facility::Math, Effect::Pure),
    ("rt_cos", "f64(f64)", Facility::Math, Effect::Pure),
    // File I/O.
    ("rt_file_open", "ptr(str,i64)", Facility::FileIo, Effect::Effectful),
    ("rt_file_close", "void(ptr)", Facility::FileIo, Effect::Effectful),
    ("rt_file_read_line", "str(ptr)", Facility::FileIo, Effect::Effectful),
    ("rt_file_write", "void(ptr,str)", Facility::FileIo, Effect::Effectful),
    ("rt_file_eof", "i1(ptr)", Facility::FileIo, Effect::Effectful),
    // Terminal I/O.
    ("rt_print_str", "void(str)", Facility::Terminal, Effect::Effectful),
    ("rt_print_i64", "void(i64)", Facility::Terminal, Effect::Effectful),
    ("rt_print_f64", "void(f64)", Facility::Terminal, Effect::Effectful),
    ("rt_input_line", "str()", Facility::Terminal, Effect::Effectful),
    // RNG.
    ("rt_rand_seed", "void(i64)", Facility::Rng, Effect::Effectful),
    ("rt_rand_next", "i64()", Facility::Rng, Effect::Effectful),
    // Trap.
    ("rt_trap", "void(str)", Facility::Trap, Effect::Effectful),
];

pub struct Registry {
    entries: Vec<HelperEntry>,
}

impl Registry {
    fn build() -> Self {
        let entries = RAW_TABLE
            .iter()
            .map(|(name, spelling, facility, effect)| HelperEntry {
                name,
                signature: Signature::parse(spelling)
                    .unwrap_or_else(|e| panic!("built-in signature `{spelling}` for {name} must parse: {e}")),
                facility: *facility,
                effect: *effect,
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<&HelperEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelperEntry> {
        self.entries.iter()
    }

    pub fn by_facility(&self, facility: Facility) -> impl Iterator<Item = &HelperEntry> {
        self.entries.iter().filter(move |e| e.facility == facility)
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Returns the shared, immutable runtime signature registry, building it
/// on first access.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::build)
}

/// Convenience accessor matching §4.2's `lookup(name) -> Option<Signature>`.
pub fn lookup(name: &str) -> Option<&'static Signature> {
    registry().lookup(name).map(|e| &e.signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_parses() {
        for entry in registry().iter() {
            assert!(!entry.signature.params.iter().any(|_| false));
            let _ = entry.signature.to_string();
        }
    }

    #[test]
    fn lookup_finds_known_helper() {
        let sig = lookup("rt_concat").unwrap();
        assert_eq!(sig.ret, Type::Str);
    }

    #[test]
    fn lookup_is_none_for_unknown_name() {
        assert!(lookup("rt_does_not_exist").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in registry().iter() {
            assert!(seen.insert(entry.name), "duplicate runtime helper {}", entry.name);
        }
    }

    #[test]
    fn math_helpers_are_pure_file_and_terminal_are_not() {
        assert_eq!(registry().lookup("rt_sqr").unwrap().effect, Effect::Pure);
        assert_eq!(registry().lookup("rt_print_str").unwrap().effect, Effect::Effectful);
        assert_eq!(registry().lookup("rt_file_open").unwrap().effect, Effect::Effectful);
    }
}
