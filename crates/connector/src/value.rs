//! Column types and values, with the store's native binary encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    BigInt,
    Text,
    Blob,
    Boolean,
    Double,
    Uuid,
}

impl ColumnType {
    /// Parses a textual literal into a value of this type.
    pub fn parse_value(&self, literal: &str) -> Result<ColumnValue, String> {
        let value = match self {
            ColumnType::Int => ColumnValue::Int(literal.parse().map_err(|e| format!("{e}"))?),
            ColumnType::BigInt => {
                ColumnValue::BigInt(literal.parse().map_err(|e| format!("{e}"))?)
            }
            ColumnType::Text => ColumnValue::Text(literal.to_string()),
            ColumnType::Blob => ColumnValue::Blob(parse_hex(literal)?),
            ColumnType::Boolean => {
                ColumnValue::Boolean(literal.parse().map_err(|e| format!("{e}"))?)
            }
            ColumnType::Double => {
                ColumnValue::Double(literal.parse().map_err(|e| format!("{e}"))?)
            }
            ColumnType::Uuid => {
                let hex: String = literal.chars().filter(|c| *c != '-').collect();
                if hex.len() != 32 {
                    return Err(format!("`{literal}` is not a uuid"));
                }
                ColumnValue::Uuid(u128::from_str_radix(&hex, 16).map_err(|e| format!("{e}"))?)
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::BigInt => "bigint",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Double => "double",
            ColumnType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

fn parse_hex(literal: &str) -> Result<Vec<u8>, String> {
    let digits = literal.strip_prefix("0x").unwrap_or(literal);
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(format!("`{literal}` is not a hex string"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| format!("{e}")))
        .collect()
}

/// A single column value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Null,
    Int(i32),
    BigInt(i64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Double(f64),
    Uuid(u128),
}

impl ColumnValue {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Int(_) => Some(ColumnType::Int),
            ColumnValue::BigInt(_) => Some(ColumnType::BigInt),
            ColumnValue::Text(_) => Some(ColumnType::Text),
            ColumnValue::Blob(_) => Some(ColumnType::Blob),
            ColumnValue::Boolean(_) => Some(ColumnType::Boolean),
            ColumnValue::Double(_) => Some(ColumnType::Double),
            ColumnValue::Uuid(_) => Some(ColumnType::Uuid),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Native binary encoding, as used in partition keys. `None` for null.
    pub fn serialize(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            ColumnValue::Null => return None,
            ColumnValue::Int(v) => v.to_be_bytes().to_vec(),
            ColumnValue::BigInt(v) => v.to_be_bytes().to_vec(),
            ColumnValue::Text(v) => v.as_bytes().to_vec(),
            ColumnValue::Blob(v) => v.clone(),
            ColumnValue::Boolean(v) => vec![u8::from(*v)],
            ColumnValue::Double(v) => v.to_bits().to_be_bytes().to_vec(),
            ColumnValue::Uuid(v) => v.to_be_bytes().to_vec(),
        };
        Some(bytes)
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("null"),
            ColumnValue::Int(v) => write!(f, "{v}"),
            ColumnValue::BigInt(v) => write!(f, "{v}"),
            ColumnValue::Text(v) => write!(f, "'{v}'"),
            ColumnValue::Blob(v) => {
                f.write_str("0x")?;
                v.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            ColumnValue::Boolean(v) => write!(f, "{v}"),
            ColumnValue::Double(v) => write!(f, "{v}"),
            ColumnValue::Uuid(v) => {
                let h = format!("{v:032x}");
                write!(f, "{}-{}-{}-{}-{}", &h[..8], &h[8..12], &h[12..16], &h[16..20], &h[20..])
            }
        }
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::BigInt(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Boolean(v)
    }
}
