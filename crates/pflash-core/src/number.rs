//! Numbers in descriptors and configuration files
//!
//! Offsets, sizes and addresses may be written either as plain integers or
//! as strings holding a decimal or `0x`-prefixed hexadecimal literal.

use serde::{Deserialize, Deserializer};

/// Integer or string form of a number, as found in YAML/JSON
#[derive(Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u64),
    Str(String),
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex '{}': {}", s, e))
    } else {
        s.parse()
            .map_err(|e| format!("invalid number '{}': {}", s, e))
    }
}

/// Deserialize a number that can be an integer, or a hex/decimal string
pub fn deserialize_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => n,
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom)?,
    };
    T::try_from(value)
        .map_err(|_| serde::de::Error::custom(format!("number {} out of range", value)))
}

/// Like [`deserialize_number`], for optional (possibly `null`) fields
pub fn deserialize_opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    match Option::<HexOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(HexOrInt::Int(n)) => T::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("number {} out of range", n))),
        Some(HexOrInt::Str(s)) => {
            let n = parse_number(&s).map_err(serde::de::Error::custom)?;
            T::try_from(n)
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("number {} out of range", n)))
        }
    }
}
