//! Identifiers and small value types shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of one object-store object: pool, namespace and name.
///
/// Used as the map key when comparing modification times against a previous
/// archive, so equality is exact on all three parts (the empty namespace is a
/// namespace like any other).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Pool the object lives in
    #[serde(rename = "Pool", default)]
    pub pool: String,
    /// Namespace within the pool
    #[serde(rename = "Namespace", default)]
    pub namespace: String,
    /// Object name
    #[serde(rename = "OID", default)]
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key
    pub fn new(pool: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            pool: pool.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pool, self.namespace, self.name)
    }
}

/// One key/value pair: an etcd row, an extended attribute or an omap entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    /// Entry key
    #[serde(rename = "Key", default)]
    pub key: String,
    /// Entry value
    #[serde(rename = "Value", default, with = "crate::wire::bytes")]
    pub value: Vec<u8>,
}

impl KeyValue {
    /// Create a new key/value pair
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An object found while listing a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectLocator {
    /// Namespace the object was found in
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectLocator {
    /// Create a new locator
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectLocator {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Qualify this locator with its pool.
    pub fn into_key(self, pool: &str) -> ObjectKey {
        ObjectKey {
            pool: pool.to_string(),
            namespace: self.namespace,
            name: self.name,
        }
    }
}

/// Result of statting an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    /// Content length in bytes
    pub size: u64,
    /// Last modification time, nanoseconds since the Unix epoch
    pub mod_time_nanos: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new("p1", "", "obj1");
        assert_eq!(key.to_string(), "p1//obj1");
    }

    #[test]
    fn test_object_key_ordering_and_equality() {
        let a = ObjectKey::new("p1", "", "a");
        let b = ObjectKey::new("p1", "ns", "a");
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_locator_into_key() {
        let key = ObjectLocator::new("ns", "obj").into_key("pool");
        assert_eq!(key, ObjectKey::new("pool", "ns", "obj"));
    }
}
