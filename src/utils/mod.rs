//! Small, dependency-free helpers shared by more than one module.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::constants::HEADER_SCAN_BYTES;

/// Reads at most [`HEADER_SCAN_BYTES`] from the start of `path`, lossily converting to
/// UTF-8.
///
/// Used by the package analyzer to inspect a source file's leading comment/import block
/// without reading (or fully parsing) the whole file, using a bounded
/// read-until-delimiter front-matter extraction rather than a whole-file parse.
pub fn read_header(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; HEADER_SCAN_BYTES];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_only_the_leading_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.go");
        let body = "a".repeat(HEADER_SCAN_BYTES * 2);
        fs::write(&path, &body).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.len(), HEADER_SCAN_BYTES);
    }
}
