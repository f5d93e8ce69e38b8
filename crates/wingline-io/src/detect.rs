//! Filetype detection: magic bytes first, suffix stack as fallback
//! (`spec.md` §4.5, "Filetype detection").

use std::io::Read;
use std::path::Path;

use wingline_core::WinglineError;

use crate::container::Container;
use crate::format::Format;

/// A resolved container + format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filetype {
    pub container: Container,
    pub format: Format,
}

const PEEK_LEN: usize = 261;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC_LOCAL: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const ZIP_MAGIC_EMPTY: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

pub fn detect_filetype(path: &Path) -> Result<Filetype, WinglineError> {
    let magic_container = peek_magic_container(path)?;
    let mut suffixes = suffix_stack(path);

    let container = match magic_container {
        Some(container) => {
            if matches!(suffixes.last().and_then(|s| Container::suffix_match(s)), Some(c) if c == container)
            {
                suffixes.pop();
            }
            container
        }
        None => match suffixes.last().and_then(|s| Container::suffix_match(s)) {
            Some(container) => {
                suffixes.pop();
                container
            }
            None => Container::Bare,
        },
    };

    let format = suffixes
        .last()
        .and_then(|s| Format::suffix_match(s))
        .ok_or_else(|| WinglineError::UnrecognizedFiletype(path.to_path_buf()))?;

    Ok(Filetype { container, format })
}

fn peek_magic_container(path: &Path) -> Result<Option<Container>, WinglineError> {
    let mut file = std::fs::File::open(path)
        .map_err(|_| WinglineError::NonexistentSource(path.to_path_buf()))?;
    let mut buf = [0u8; PEEK_LEN];
    let n = file.read(&mut buf)?;
    let buf = &buf[..n];

    if buf.starts_with(&GZIP_MAGIC) {
        return Ok(Some(Container::Gzip));
    }
    if buf.starts_with(&ZIP_MAGIC_LOCAL) || buf.starts_with(&ZIP_MAGIC_EMPTY) {
        return Ok(Some(Container::Zip));
    }
    Ok(None)
}

/// The path's extensions, outermost last: `a/b/file.jl.gz` -> `["jl", "gz"]`.
fn suffix_stack(path: &Path) -> Vec<String> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return Vec::new(),
    };
    let mut parts: Vec<&str> = name.split('.').collect();
    if parts.len() <= 1 {
        return Vec::new();
    }
    parts.remove(0); // the stem
    parts.into_iter().map(|s| s.to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn suffix_fallback_detects_bare_csv() {
        let (_dir, path) = write_temp("people.csv", b"a,b\n1,2\n");
        let filetype = detect_filetype(&path).unwrap();
        assert_eq!(filetype.container, Container::Bare);
        assert_eq!(filetype.format, Format::Csv);
    }

    #[test]
    fn gzip_magic_plus_suffix_stack_detects_jsonlines() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynamodb-tv-casts.jl.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(b"{\"a\":1}\n").unwrap();
        enc.finish().unwrap();

        let filetype = detect_filetype(&path).unwrap();
        assert_eq!(filetype.container, Container::Gzip);
        assert_eq!(filetype.format, Format::JsonLines);
    }

    #[test]
    fn unrecognized_suffix_fails() {
        let (_dir, path) = write_temp("data.bin", b"whatever");
        assert!(detect_filetype(&path).is_err());
    }
}
