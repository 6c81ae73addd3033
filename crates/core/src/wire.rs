//! Serde helpers for the MessagePack container encoding.
//!
//! Archives written by other producers may encode an empty byte string or an
//! empty list as `nil` instead of a zero-length value. Both decode to empty.

pub(crate) mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::ByteBuf;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serde_bytes::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let buf: Option<ByteBuf> = Option::deserialize(deserializer)?;
        Ok(buf.map(ByteBuf::into_vec).unwrap_or_default())
    }
}

pub(crate) mod seq {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}
