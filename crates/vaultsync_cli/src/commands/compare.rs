//! Compare command implementation.

use std::path::Path;
use vaultsync_engine::files_equal_with_chunk;

/// Runs the compare command. Fails if the files differ.
pub fn run(a: &Path, b: &Path, chunk_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    if files_equal_with_chunk(a, b, chunk_size)? {
        println!("identical");
        Ok(())
    } else {
        Err(format!("{} and {} differ", a.display(), b.display()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reports_difference() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"same").unwrap();
        std::fs::write(&b, b"same").unwrap();
        assert!(run(&a, &b, 4).is_ok());

        std::fs::write(&b, b"diff").unwrap();
        assert!(run(&a, &b, 4).is_err());
    }
}
