//! `Expected<T>`: a value-or-diagnostic sum used by every fallible API in
//! the toolchain so callers never have to deal with exceptions.

use crate::diag::Diag;

pub type Expected<T> = Result<T, Diag>;

/// Extension methods that read naturally at call sites that thread a
/// `SourceLoc`-less `Diag` through a chain of fallible steps.
pub trait ExpectedExt<T> {
    fn or_err(self, message: impl Into<String>) -> Expected<T>;
}

impl<T> ExpectedExt<T> for Option<T> {
    fn or_err(self, message: impl Into<String>) -> Expected<T> {
        self.ok_or_else(|| Diag::error(message))
    }
}
