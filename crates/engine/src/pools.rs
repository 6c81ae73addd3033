//! Pool selection for backup/clear and pool remapping for restore.

use std::collections::BTreeMap;
use tsvault_core::{Error, ObjectStore, Result};

/// Include/skip lists given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSelection {
    /// Pools to back up. When non-empty, exactly these pools are used.
    pub include: Vec<String>,
    /// Pools to leave out. Only consulted when `include` is empty.
    pub skip: Vec<String>,
}

impl PoolSelection {
    /// Every pool in the store.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select from include and skip lists.
    pub fn new(include: Vec<String>, skip: Vec<String>) -> Self {
        PoolSelection { include, skip }
    }

    /// Exactly the given pools.
    pub fn only<I, S>(pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PoolSelection {
            include: pools.into_iter().map(Into::into).collect(),
            skip: Vec::new(),
        }
    }
}

/// Resolve a selection against the pools that exist in `store`.
///
/// Every included pool must exist. With no include list, every existing pool
/// not named in the skip list is selected, in the order the store lists them.
pub fn select_pools(store: &dyn ObjectStore, selection: &PoolSelection) -> Result<Vec<String>> {
    let existing = store.list_pools()?;
    check_pools_exist(&existing, &selection.include)?;
    if !selection.include.is_empty() {
        return Ok(selection.include.clone());
    }
    Ok(existing
        .into_iter()
        .filter(|pool| !selection.skip.contains(pool))
        .collect())
}

/// Fail with `PoolNotFound` for the first pool in `wanted` not in `existing`.
pub fn check_pools_exist<S: AsRef<str>>(existing: &[String], wanted: &[S]) -> Result<()> {
    for pool in wanted {
        let pool = pool.as_ref();
        if !existing.iter().any(|p| p == pool) {
            return Err(Error::PoolNotFound(pool.to_string()));
        }
    }
    Ok(())
}

/// Source pool to destination pool mapping used by restore.
///
/// Objects from a source pool with no mapping are not restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMap {
    map: BTreeMap<String, String>,
}

impl PoolMap {
    /// Parse `SRC:DST` arguments. A later mapping for the same source wins.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for arg in args {
            let (src, dst) = Self::parse_one(arg.as_ref())?;
            map.insert(src, dst);
        }
        Ok(PoolMap { map })
    }

    /// Parse one `SRC:DST` argument.
    pub fn parse_one(arg: &str) -> Result<(String, String)> {
        let mut parts = arg.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(src), Some(dst), None) if !src.is_empty() && !dst.is_empty() => {
                Ok((src.to_string(), dst.to_string()))
            }
            _ => Err(Error::invalid_operation(format!(
                "invalid restore-pool argument {:?}, expected SRC:DST",
                arg
            ))),
        }
    }

    /// Add a mapping (builder pattern).
    pub fn with(mut self, src: impl Into<String>, dst: impl Into<String>) -> Self {
        self.map.insert(src.into(), dst.into());
        self
    }

    /// Destination for a source pool
    pub fn destination(&self, src: &str) -> Option<&str> {
        self.map.get(src).map(String::as_str)
    }

    /// Distinct destination pools, sorted
    pub fn destinations(&self) -> Vec<String> {
        let mut pools: Vec<String> = self.map.values().cloned().collect();
        pools.sort();
        pools.dedup();
        pools
    }

    /// Whether no mapping is configured
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsvault_core::MemoryObjectStore;

    #[test]
    fn test_select_all_minus_skip() {
        let store = MemoryObjectStore::with_pools(["a", "b", "c"]);
        let selection = PoolSelection::new(Vec::new(), vec!["b".to_string()]);
        assert_eq!(select_pools(&store, &selection).unwrap(), vec!["a", "c"]);
        assert_eq!(
            select_pools(&store, &PoolSelection::all()).unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_include_wins_over_skip() {
        let store = MemoryObjectStore::with_pools(["a", "b", "c"]);
        let selection = PoolSelection::new(vec!["b".to_string()], vec!["b".to_string()]);
        assert_eq!(select_pools(&store, &selection).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_missing_include() {
        let store = MemoryObjectStore::with_pools(["a"]);
        let err = select_pools(&store, &PoolSelection::only(["zz"])).unwrap_err();
        assert!(matches!(err, Error::PoolNotFound(p) if p == "zz"));
    }

    #[test]
    fn test_pool_map_parse() {
        let map = PoolMap::parse(&["p1:p2", "p3:p2", "p1:p4"]).unwrap();
        assert_eq!(map.destination("p1"), Some("p4"));
        assert_eq!(map.destination("p3"), Some("p2"));
        assert_eq!(map.destination("p2"), None);
        assert_eq!(map.destinations(), vec!["p2", "p4"]);
    }

    #[test]
    fn test_pool_map_rejects_malformed() {
        for bad in ["p1", "p1:", ":p2", "a:b:c", ""] {
            assert!(PoolMap::parse(&[bad]).is_err(), "{:?} accepted", bad);
        }
    }
}
