//! Storage path normalization.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize a storage path, rejecting anything that could leave the root.
///
/// `.` components, repeated and trailing separators vanish, and `..` cancels
/// the previous component. A path that climbs above the root, carries a
/// Windows prefix or a NUL byte, or normalizes to nothing is
/// [`InvalidPath`](ErrorKind::InvalidPath). A leading `/` is ignored rather
/// than rejected, so absolute-looking paths still land inside the root.
///
/// ```
/// use std::path::Path;
/// use ctpack_storage::validate_path;
///
/// assert_eq!(validate_path("tracks//./3054.szs/").unwrap(), Path::new("tracks/3054.szs"));
/// assert_eq!(validate_path("tmp/../manifest.ini").unwrap(), Path::new("manifest.ini"));
/// assert!(validate_path("../etc/passwd").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut kept = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if kept.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            // Components() lets NUL through on Unix; syscalls would truncate at it.
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(part) => kept.push(part),
        }
    }
    if kept.is_empty() {
        exn::bail!(invalid());
    }
    Ok(kept.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("COURSE/STAR_SLOPE.SZS", "COURSE/STAR_SLOPE.SZS")]
    #[case("thumbnails/03054.jpg", "thumbnails/03054.jpg")]
    #[case("a//b/./c", "a/b/c")]
    #[case("tracks///", "tracks")]
    #[case("tracks/tmp/..", "tracks")]
    #[case("/manifest.ini", "manifest.ini")]
    fn test_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("")]
    #[case("./.")]
    #[case("//")]
    #[case("a\0b")]
    fn test_rejects(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
