//! Typed payloads carried inside archive frames.
//!
//! Every frame's content is exactly one [`Container`]. The frame's type code
//! says which variant it is; the content is the variant encoded as a
//! MessagePack map. Field names are fixed so existing archives stay
//! readable:
//!
//! ```text
//! EtcdRecords     (10)  {"KVz": [{"Key": str, "Value": bin}, ...]}
//! CephObject      (20)  {"OMAPData", "XATTRData", "Content", "Name", "Namespace", "Pool"}
//! BackupMetadata  (30)  {"NumberOfFiles": int,
//!                        "Timestamps": [{"Key": {"Pool", "Namespace", "OID"}, "Val": int}]}
//! ```
//!
//! Type codes are stable and never reused for a different shape.

use crate::error::{Error, Result};
use crate::types::{KeyValue, ObjectKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hard limit on a single object's content. Larger objects abort the backup.
pub const MAX_OBJECT_SIZE: u64 = 50 * 1024 * 1024;

/// Frame type codes for container variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ContainerType {
    /// Batch of key-value store rows
    EtcdRecords = 10,
    /// One object-store object with its xattrs and omap
    CephObject = 20,
    /// Backup manifest
    BackupMetadata = 30,
}

impl ContainerType {
    /// Numeric code written into the frame header
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            ContainerType::EtcdRecords => "EtcdRecords",
            ContainerType::CephObject => "CephObject",
            ContainerType::BackupMetadata => "BackupMetadata",
        }
    }
}

impl TryFrom<u32> for ContainerType {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            10 => Ok(ContainerType::EtcdRecords),
            20 => Ok(ContainerType::CephObject),
            30 => Ok(ContainerType::BackupMetadata),
            other => Err(Error::UnknownContainer(other)),
        }
    }
}

/// A batch of key-value store rows. Row order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdRecords {
    /// Rows in this batch
    #[serde(rename = "KVz", default, deserialize_with = "crate::wire::seq::deserialize")]
    pub rows: Vec<KeyValue>,
}

impl EtcdRecords {
    /// Create a batch from rows
    pub fn new(rows: Vec<KeyValue>) -> Self {
        EtcdRecords { rows }
    }
}

/// Full snapshot of one object-store object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CephObject {
    /// Per-object map entries
    #[serde(rename = "OMAPData", default, deserialize_with = "crate::wire::seq::deserialize")]
    pub omap: Vec<KeyValue>,
    /// Extended attributes
    #[serde(rename = "XATTRData", default, deserialize_with = "crate::wire::seq::deserialize")]
    pub xattrs: Vec<KeyValue>,
    /// Object content
    #[serde(rename = "Content", default, with = "crate::wire::bytes")]
    pub content: Vec<u8>,
    /// Object name
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Namespace within the pool
    #[serde(rename = "Namespace", default)]
    pub namespace: String,
    /// Source pool
    #[serde(rename = "Pool", default)]
    pub pool: String,
}

impl CephObject {
    /// Key identifying this object in its source pool
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.pool, &self.namespace, &self.name)
    }

    /// Content plus xattr and omap values, in bytes
    pub fn payload_len(&self) -> usize {
        self.content.len()
            + self.xattrs.iter().map(|kv| kv.key.len() + kv.value.len()).sum::<usize>()
            + self.omap.iter().map(|kv| kv.key.len() + kv.value.len()).sum::<usize>()
    }
}

/// Last-seen modification time of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampEntry {
    /// Object the timestamp belongs to
    #[serde(rename = "Key", default)]
    pub key: ObjectKey,
    /// Modification time, nanoseconds since the Unix epoch
    #[serde(rename = "Val", default)]
    pub mod_time_nanos: i64,
}

/// Manifest written once at the end of a backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Number of data files in the archive
    #[serde(rename = "NumberOfFiles", default)]
    pub file_count: u32,
    /// Modification times of the objects captured by this run
    #[serde(rename = "Timestamps", default, deserialize_with = "crate::wire::seq::deserialize")]
    pub timestamps: Vec<TimestampEntry>,
}

impl BackupMetadata {
    /// Build a manifest from a timestamp map.
    ///
    /// Entries are sorted by key so that the same map always encodes to the
    /// same bytes.
    pub fn from_timestamps(
        file_count: u32,
        timestamps: impl IntoIterator<Item = (ObjectKey, i64)>,
    ) -> Self {
        let mut timestamps: Vec<TimestampEntry> = timestamps
            .into_iter()
            .map(|(key, mod_time_nanos)| TimestampEntry {
                key,
                mod_time_nanos,
            })
            .collect();
        timestamps.sort_by(|a, b| a.key.cmp(&b.key));
        BackupMetadata {
            file_count,
            timestamps,
        }
    }

    /// Index the timestamps by object key. A later duplicate wins.
    pub fn timestamp_index(&self) -> HashMap<ObjectKey, i64> {
        self.timestamps
            .iter()
            .map(|entry| (entry.key.clone(), entry.mod_time_nanos))
            .collect()
    }
}

/// A typed archive payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// Key-value store rows
    EtcdRecords(EtcdRecords),
    /// Object-store object
    CephObject(CephObject),
    /// Backup manifest
    BackupMetadata(BackupMetadata),
}

impl Container {
    /// Type code of this container
    pub fn container_type(&self) -> ContainerType {
        match self {
            Container::EtcdRecords(_) => ContainerType::EtcdRecords,
            Container::CephObject(_) => ContainerType::CephObject,
            Container::BackupMetadata(_) => ContainerType::BackupMetadata,
        }
    }

    /// Encode to the MessagePack map representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size_hint());
        match self {
            Container::EtcdRecords(c) => rmp_serde::encode::write_named(&mut buf, c)?,
            Container::CephObject(c) => rmp_serde::encode::write_named(&mut buf, c)?,
            Container::BackupMetadata(c) => rmp_serde::encode::write_named(&mut buf, c)?,
        }
        Ok(buf)
    }

    /// Decode content carrying the given frame type code.
    pub fn decode(type_code: u32, content: &[u8]) -> Result<Self> {
        let container = match ContainerType::try_from(type_code)? {
            ContainerType::EtcdRecords => Container::EtcdRecords(rmp_serde::from_slice(content)?),
            ContainerType::CephObject => Container::CephObject(rmp_serde::from_slice(content)?),
            ContainerType::BackupMetadata => {
                Container::BackupMetadata(rmp_serde::from_slice(content)?)
            }
        };
        Ok(container)
    }

    /// Upper-bound estimate of the encoded size, for buffer pre-sizing only.
    pub fn size_hint(&self) -> usize {
        // map header + field name + worst-case length prefix
        const FIELD: usize = 16;
        const KV: usize = 2 * FIELD;
        let kv_len = |rows: &[KeyValue]| {
            rows.iter()
                .map(|kv| KV + kv.key.len() + kv.value.len())
                .sum::<usize>()
        };
        match self {
            Container::EtcdRecords(c) => FIELD + kv_len(&c.rows),
            Container::CephObject(c) => {
                6 * FIELD
                    + kv_len(&c.omap)
                    + kv_len(&c.xattrs)
                    + c.content.len()
                    + c.name.len()
                    + c.namespace.len()
                    + c.pool.len()
            }
            Container::BackupMetadata(c) => {
                2 * FIELD
                    + c.timestamps
                        .iter()
                        .map(|t| {
                            5 * FIELD + t.key.pool.len() + t.key.namespace.len() + t.key.name.len()
                        })
                        .sum::<usize>()
            }
        }
    }
}

impl From<EtcdRecords> for Container {
    fn from(c: EtcdRecords) -> Self {
        Container::EtcdRecords(c)
    }
}

impl From<CephObject> for Container {
    fn from(c: CephObject) -> Self {
        Container::CephObject(c)
    }
}

impl From<BackupMetadata> for Container {
    fn from(c: BackupMetadata) -> Self {
        Container::BackupMetadata(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_object() -> CephObject {
        CephObject {
            omap: vec![KeyValue::new("o1", b"x".to_vec())],
            xattrs: vec![KeyValue::new("a", b"b".to_vec())],
            content: b"hello".to_vec(),
            name: "obj1".into(),
            namespace: "".into(),
            pool: "p1".into(),
        }
    }

    #[test]
    fn test_type_codes_are_stable() {
        assert_eq!(ContainerType::EtcdRecords.code(), 10);
        assert_eq!(ContainerType::CephObject.code(), 20);
        assert_eq!(ContainerType::BackupMetadata.code(), 30);
        assert_eq!(ContainerType::try_from(20).unwrap(), ContainerType::CephObject);
        assert!(matches!(
            ContainerType::try_from(11),
            Err(Error::UnknownContainer(11))
        ));
    }

    #[test]
    fn test_etcd_records_wire_bytes() {
        let c = Container::from(EtcdRecords::new(vec![KeyValue::new("k1", b"v1".to_vec())]));
        let mut expected = vec![0x81, 0xa3];
        expected.extend_from_slice(b"KVz");
        expected.extend_from_slice(&[0x91, 0x82, 0xa3]);
        expected.extend_from_slice(b"Key");
        expected.push(0xa2);
        expected.extend_from_slice(b"k1");
        expected.push(0xa5);
        expected.extend_from_slice(b"Value");
        expected.extend_from_slice(&[0xc4, 0x02]);
        expected.extend_from_slice(b"v1");
        assert_eq!(c.encode().unwrap(), expected);
    }

    #[test]
    fn test_object_roundtrip() {
        let c = Container::from(sample_object());
        let bytes = c.encode().unwrap();
        let decoded = Container::decode(20, &bytes).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn test_nil_collections_decode_as_empty() {
        // {"KVz": nil}
        let mut bytes = vec![0x81, 0xa3];
        bytes.extend_from_slice(b"KVz");
        bytes.push(0xc0);
        let decoded = Container::decode(10, &bytes).unwrap();
        assert_eq!(decoded, Container::EtcdRecords(EtcdRecords::default()));
    }

    #[test]
    fn test_missing_fields_decode_as_empty() {
        // {"Name": "x"}
        let mut bytes = vec![0x81, 0xa4];
        bytes.extend_from_slice(b"Name");
        bytes.push(0xa1);
        bytes.push(b'x');
        let decoded = Container::decode(20, &bytes).unwrap();
        let Container::CephObject(obj) = decoded else {
            panic!("expected CephObject");
        };
        assert_eq!(obj.name, "x");
        assert!(obj.content.is_empty());
        assert!(obj.xattrs.is_empty());
        assert!(obj.omap.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        // {"NumberOfFiles": 3, "Extra": true}
        let mut bytes = vec![0x82, 0xad];
        bytes.extend_from_slice(b"NumberOfFiles");
        bytes.push(0x03);
        bytes.push(0xa5);
        bytes.extend_from_slice(b"Extra");
        bytes.push(0xc3);
        let decoded = Container::decode(30, &bytes).unwrap();
        assert_eq!(
            decoded,
            Container::BackupMetadata(BackupMetadata {
                file_count: 3,
                timestamps: vec![],
            })
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let bytes = Container::from(sample_object()).encode().unwrap();
        assert!(matches!(
            Container::decode(99, &bytes),
            Err(Error::UnknownContainer(99))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Container::decode(20, &[0xff, 0x00, 0x13]).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_metadata_from_timestamps_sorted() {
        let meta = BackupMetadata::from_timestamps(
            2,
            vec![
                (ObjectKey::new("p2", "", "b"), 5),
                (ObjectKey::new("p1", "", "a"), 7),
            ],
        );
        assert_eq!(meta.file_count, 2);
        assert_eq!(meta.timestamps[0].key.pool, "p1");
        let index = meta.timestamp_index();
        assert_eq!(index.get(&ObjectKey::new("p2", "", "b")), Some(&5));
    }

    #[test]
    fn test_size_hint_covers_encoding() {
        let containers = vec![
            Container::from(sample_object()),
            Container::from(EtcdRecords::new(vec![KeyValue::new("k", vec![0u8; 300])])),
            Container::from(BackupMetadata::from_timestamps(
                1,
                vec![(ObjectKey::new("p", "n", "o"), i64::MIN)],
            )),
        ];
        for c in containers {
            assert!(c.size_hint() >= c.encode().unwrap().len());
        }
    }
}
