//! The filesystem contract: unique temp files for a single
//! `Submit`/`Status`/`Kill` call, scoped to that call's lifetime.
//!
//! Built on the `tempfile` crate rather than hand-rolled unique naming.
//! `TempPath` gives us exactly the semantics we need: a unique path that's
//! removed when the scope ends, unless a caller explicitly wants to keep
//! it around for post-mortem diagnosis (`TempPath::keep`).

use std::io;
use tempfile::TempPath;

/// Allocates a uniquely-named temp file under the system temp directory
/// with the given `prefix`, returning its path. The file is removed when
/// the returned `TempPath` is dropped unless `.keep()` is called on it.
pub fn alloc(prefix: &str) -> io::Result<TempPath> {
    let file = tempfile::Builder::new().prefix(prefix).tempfile()?;
    Ok(file.into_temp_path())
}

#[cfg(test)]
#[path = "tempfiles_tests.rs"]
mod tests;
