//! Path checks run once before any stream is opened.

use crate::error::{Error, Result};
use std::path::Path;

/// Checks that `input` is an existing file and, if given, that `output`
/// does not exist yet and is a different path.
pub fn check_paths(input: &Path, output: Option<&Path>) -> Result<()> {
    if !input.is_file() {
        return Err(Error::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    let Some(output) = output else {
        return Ok(());
    };

    if same_file(input, output) {
        return Err(Error::SamePath {
            path: output.to_path_buf(),
        });
    }
    if output.exists() {
        return Err(Error::OutputExists {
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
