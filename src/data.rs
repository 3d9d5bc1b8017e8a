//! Loading the static identity data named in the configuration.

use crate::error::{ErrorKind, Result};
use ctpack_config::DataConfig;
use ctpack_crs1::Crs1Table;
use ctpack_identity::{AliasGraph, OverrideTable, Resolver, TrackDatabase};
use exn::ResultExt;
use std::path::Path;

/// Track database, alias graph and override table combined. Aliases are
/// optional; overrides always include the built-in table. An override may not
/// reuse a track id the database gives to other content.
pub fn resolver(data: &DataConfig) -> Result<Resolver> {
    let database = TrackDatabase::load(&data.tracks).or_raise(|| ErrorKind::Data(data.tracks.clone()))?;
    let aliases = match &data.aliases {
        Some(path) => AliasGraph::load(path).or_raise(|| ErrorKind::Data(path.clone()))?,
        None => AliasGraph::default(),
    };
    let overrides = match &data.overrides {
        Some(path) => OverrideTable::load(path).or_raise(|| ErrorKind::Data(path.clone()))?,
        None => OverrideTable::builtin(),
    };
    let overrides_path = data.overrides.as_ref().unwrap_or(&data.tracks);
    overrides.check_against(&database).or_raise(|| ErrorKind::Data(overrides_path.clone()))?;
    Ok(Resolver::new(database, aliases, overrides))
}

/// The CRS1 course table, when one is configured.
pub async fn crs1(data: &DataConfig) -> Result<Option<Crs1Table>> {
    let Some(path) = &data.crs1 else {
        return Ok(None);
    };
    Ok(Some(read_crs1(path).await?))
}

async fn read_crs1(path: &Path) -> Result<Crs1Table> {
    let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Data(path.to_path_buf()))?;
    let table = ctpack_crs1::parse(&bytes).or_raise(|| ErrorKind::Data(path.to_path_buf()))?;
    tracing::info!(path = %path.display(), entries = table.len(), "Loaded course table");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctpack_identity::{ContentHash, Resolution};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const KNOWN: &str = "1111111111111111111111111111111111111111";
    const ALIASED: &str = "2222222222222222222222222222222222222222";
    const STAR_SLOPE: &str = "4f86672b7014baf1f496e36ecf0c55ac455bf329";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn tracks(dir: &TempDir) -> PathBuf {
        write(
            dir,
            "tracks.toml",
            &format!(
                r#"
                    [[tracks]]
                    sha1 = "{KNOWN}"
                    id = "3054"
                    name = "Sky Garden"
                    category = "race"
                    slot = 8
                "#
            ),
        )
    }

    #[test]
    fn test_resolver_with_aliases_and_builtin_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataConfig {
            tracks: tracks(&dir),
            aliases: Some(write(&dir, "aliases.toml", &format!("[aliases]\n\"{ALIASED}\" = \"{KNOWN}\"\n"))),
            overrides: None,
            crs1: None,
        };
        let resolver = resolver(&data).unwrap();

        let aliased: ContentHash = ALIASED.parse().unwrap();
        assert!(matches!(resolver.resolve(&aliased), Resolution::Known { record, .. } if record.id == "3054"));
        let unreleased: ContentHash = STAR_SLOPE.parse().unwrap();
        assert!(matches!(resolver.resolve(&unreleased), Resolution::Overridden(record) if record.name == "Star Slope"));
    }

    #[test]
    fn test_override_cannot_reuse_a_database_id() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = write(
            &dir,
            "overrides.toml",
            r#"
                [[tracks]]
                sha1 = "3333333333333333333333333333333333333333"
                id = "3054"
                name = "Sky Garden (Beta)"
                category = "race"
                slot = 8
            "#,
        );
        let data = DataConfig { tracks: tracks(&dir), overrides: Some(overrides.clone()), ..Default::default() };
        let err = resolver(&data).unwrap_err();
        assert_eq!(*err, ErrorKind::Data(overrides));
    }

    #[test]
    fn test_database_rejects_repeated_track_id() {
        let dir = tempfile::tempdir().unwrap();
        let row = |sha1: &str| {
            format!("[[tracks]]\nsha1 = \"{sha1}\"\nid = \"3054\"\nname = \"Sky Garden\"\ncategory = \"race\"\nslot = 8\n")
        };
        let contents = format!("{}\n{}", row(KNOWN), row(ALIASED));
        let data = DataConfig { tracks: write(&dir, "tracks.toml", &contents), ..Default::default() };
        let err = resolver(&data).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Data(path) if path.ends_with("tracks.toml")));
    }

    #[test]
    fn test_missing_database_names_the_file() {
        let data = DataConfig { tracks: PathBuf::from("/nonexistent/tracks.toml"), ..Default::default() };
        let err = resolver(&data).unwrap_err();
        assert_eq!(*err, ErrorKind::Data(PathBuf::from("/nonexistent/tracks.toml")));
    }

    #[tokio::test]
    async fn test_crs1_is_optional() {
        assert!(crs1(&DataConfig::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_crs1_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataConfig { crs1: Some(write(&dir, "course.bin", "not a course table")), ..Default::default() };
        let err = crs1(&data).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Data(path) if path.ends_with("course.bin")));
    }
}
