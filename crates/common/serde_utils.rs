use serde::{Deserialize, Deserializer, Serializer, de::Error};

pub mod u64 {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    /// Accepts a JSON number, a decimal string or a `0x`-prefixed hex string,
    /// the way `eth_getLogs` responses and hand-written fixtures mix them.
    pub mod hex_or_dec {
        use super::*;

        pub fn deserialize<'de, D>(d: D) -> Result<u64, D::Error>
        where
            D: Deserializer<'de>,
        {
            match NumberOrString::deserialize(d)? {
                NumberOrString::Number(n) => Ok(n),
                NumberOrString::String(value) => {
                    if let Some(hex) = value.strip_prefix("0x") {
                        u64::from_str_radix(hex, 16)
                            .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
                    } else {
                        value
                            .parse()
                            .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
                    }
                }
            }
        }

        pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }
}

pub mod bytes {
    use ::bytes::Bytes;

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        let bytes =
            hex::decode(value.trim_start_matches("0x")).map_err(|e| D::Error::custom(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{value:x}"))
    }
}

/// Key material is stored and shown without a `0x` prefix.
pub mod h256_plain {
    use ethereum_types::H256;

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<H256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(d)?;
        let bytes =
            hex::decode(value.trim_start_matches("0x")).map_err(|e| D::Error::custom(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(D::Error::custom(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(H256::from_slice(&bytes))
    }

    pub fn serialize<S>(value: &H256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value.as_bytes()))
    }
}
