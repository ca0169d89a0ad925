//! Static check that every required tool resolves before anything is spawned.

use crate::ReconError;
use std::path::PathBuf;
use tracing::debug;

/// Resolve a program name (or path) the same way spawning would.
pub fn resolve(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Fails on the first program that cannot be found, in the given order.
pub fn check_programs<I, S>(programs: I) -> Result<(), ReconError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for p in programs {
        let p = p.as_ref();
        match resolve(p) {
            Some(path) => debug!(program = p, path = %path.display(), "found"),
            None => return Err(ReconError::MissingBinary(p.to_string())),
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn finds_shell() {
        assert!(check_programs(["sh"]).is_ok());
        assert!(check_programs(Vec::<String>::new()).is_ok());
    }

    #[test]
    fn reports_first_missing() {
        let err = check_programs(["sh", "no-such-tool-aaa", "no-such-tool-bbb"]).unwrap_err();
        assert_eq!(err.to_string(), "Missing binary: no-such-tool-aaa");
    }
}
