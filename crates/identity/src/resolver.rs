use crate::{AliasGraph, ContentHash, OverrideTable, TrackDatabase, TrackRecord};
use std::collections::HashSet;

/// Outcome of resolving a single content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Found in the track database, either directly or through the alias
    /// graph. `hash` is the canonical hash the record is stored under.
    Known { hash: ContentHash, record: &'a TrackRecord },
    /// Only the override table knows about this hash.
    Overridden(&'a TrackRecord),
    /// Nothing resolved the hash, or its alias chain is cyclic.
    Unresolved,
}

/// Composes the track database, alias graph and override table into a single
/// lookup with a fixed precedence: database, then aliases, then overrides.
///
/// All three sources are immutable once loaded, so a resolver can be shared
/// freely between tasks without locking.
#[derive(Debug, Default, Clone)]
pub struct Resolver {
    database: TrackDatabase,
    aliases: AliasGraph,
    overrides: OverrideTable,
}
impl Resolver {
    pub fn new(database: TrackDatabase, aliases: AliasGraph, overrides: OverrideTable) -> Self {
        Self { database, aliases, overrides }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn resolve(&self, hash: &ContentHash) -> Resolution<'_> {
        if let Some(record) = self.database.get(hash) {
            return Resolution::Known { hash: *hash, record };
        }
        match self.follow_aliases(hash) {
            Walk::Hit(hash, record) => return Resolution::Known { hash, record },
            Walk::Cycle => return Resolution::Unresolved,
            Walk::Exhausted => {},
        }
        match self.overrides.get(hash) {
            Some(record) => Resolution::Overridden(record),
            None => Resolution::Unresolved,
        }
    }

    /// Walks the alias chain starting at `start` until a hop lands on a
    /// database key, the chain ends, or a hash repeats.
    ///
    /// A cycle-free chain visits each edge at most once, so the hop count is
    /// also bounded by the number of edges.
    fn follow_aliases(&self, start: &ContentHash) -> Walk<'_> {
        let mut visited = HashSet::from([*start]);
        let mut current = *start;
        for _ in 0..self.aliases.len() {
            let Some(next) = self.aliases.next(&current) else {
                return Walk::Exhausted;
            };
            if !visited.insert(*next) {
                tracing::warn!(hash = %start, repeated = %next, hops = visited.len(), "Alias chain is cyclic; treating as unresolved");
                return Walk::Cycle;
            }
            if let Some(record) = self.database.get(next) {
                tracing::debug!(hash = %start, canonical = %next, hops = visited.len() - 1, "Resolved through alias graph");
                return Walk::Hit(*next, record);
            }
            current = *next;
        }
        match self.aliases.next(&current) {
            // Unreachable with a visited set, but the bound is what guarantees termination.
            Some(_) => Walk::Cycle,
            None => Walk::Exhausted,
        }
    }
}

enum Walk<'a> {
    Hit(ContentHash, &'a TrackRecord),
    Exhausted,
    Cycle,
}
