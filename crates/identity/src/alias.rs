use crate::ContentHash;
use crate::error::{ErrorKind, Result};
use crate::table;
use exn::ResultExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::instrument;

#[derive(Deserialize)]
struct AliasTable {
    #[serde(default)]
    aliases: HashMap<ContentHash, ContentHash>,
}

/// Redirects from superseded content hashes to their replacements.
///
/// Each aliased hash points at exactly one other hash, which may itself be
/// aliased. The data is untrusted: it may contain self-loops or longer cycles,
/// and consumers must walk it with a bound (see
/// [`Resolver`](crate::Resolver)).
#[derive(Debug, Default, Clone)]
pub struct AliasGraph {
    edges: HashMap<ContentHash, ContentHash>,
}
impl AliasGraph {
    /// Load the graph from a TOML file containing an `[aliases]` table of
    /// `"aliased" = "real"` pairs.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let graph = Self::from_toml(&table::read(path)?, path)?;
        tracing::info!(path = %path.display(), aliases = graph.len(), "Loaded alias graph");
        Ok(graph)
    }

    pub fn from_toml(contents: &str, origin: &Path) -> Result<Self> {
        let table: AliasTable = toml::from_str(contents).or_raise(|| ErrorKind::Malformed(origin.to_path_buf()))?;
        Ok(table.aliases.into_iter().collect())
    }

    /// The hash that `aliased` redirects to, if any.
    pub fn next(&self, aliased: &ContentHash) -> Option<&ContentHash> {
        self.edges.get(aliased)
    }

    /// Number of edges; also the longest possible cycle-free chain.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
impl FromIterator<(ContentHash, ContentHash)> for AliasGraph {
    fn from_iter<I: IntoIterator<Item = (ContentHash, ContentHash)>>(iter: I) -> Self {
        let edges: HashMap<_, _> = iter.into_iter().collect();
        for (aliased, real) in &edges {
            if aliased == real {
                tracing::warn!(hash = %aliased, "Alias graph contains a self-referencing entry");
            }
        }
        Self { edges }
    }
}
