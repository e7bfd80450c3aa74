//! Shared-store value codec.
//!
//! Store values cross the wire as a single JSON token. Only scalars are
//! accepted: null, booleans, integers, floats and strings. Arrays and
//! objects are rejected because peers are untrusted and the store is a
//! value cache, not an object transport. Encoding renders the canonical JSON
//! token, so decode(encode(v)) == v over the whole scalar domain.

use std::fmt;

use thiserror::Error;

/// A scalar value held in the shared store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("value is not valid JSON")]
    Syntax,
    #[error("arrays and objects are not storable")]
    Unsupported,
}

impl StoreValue {
    /// Decode a wire token into a scalar value.
    pub fn decode(token: &str) -> Result<StoreValue, ValueError> {
        let parsed: serde_json::Value =
            serde_json::from_str(token.trim()).map_err(|_| ValueError::Syntax)?;
        match parsed {
            serde_json::Value::Null => Ok(StoreValue::Null),
            serde_json::Value::Bool(b) => Ok(StoreValue::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(StoreValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(StoreValue::Float(f))
                } else {
                    // u64 above i64::MAX; out of the supported domain.
                    Err(ValueError::Unsupported)
                }
            }
            serde_json::Value::String(s) => Ok(StoreValue::Str(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(ValueError::Unsupported)
            }
        }
    }

    /// Encode as the canonical JSON token.
    pub fn encode(&self) -> String {
        match self {
            StoreValue::Null => "null".to_string(),
            StoreValue::Bool(b) => b.to_string(),
            StoreValue::Int(i) => i.to_string(),
            StoreValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "null".to_string()),
            StoreValue::Str(s) => serde_json::Value::String(s.clone()).to_string(),
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        for (token, value) in [
            ("null", StoreValue::Null),
            ("true", StoreValue::Bool(true)),
            ("42", StoreValue::Int(42)),
            ("-7", StoreValue::Int(-7)),
            ("2.5", StoreValue::Float(2.5)),
            ("\"hello world\"", StoreValue::Str("hello world".to_string())),
        ] {
            let decoded = StoreValue::decode(token).expect("scalar must decode");
            assert_eq!(decoded, value);
            assert_eq!(StoreValue::decode(&decoded.encode()), Ok(value));
        }
    }

    #[test]
    fn strings_keep_embedded_spaces_and_escapes() {
        let decoded = StoreValue::decode("\"a \\\"quoted\\\" word\"").unwrap();
        assert_eq!(decoded, StoreValue::Str("a \"quoted\" word".to_string()));
    }

    #[test]
    fn containers_are_rejected() {
        assert_eq!(StoreValue::decode("[1, 2]"), Err(ValueError::Unsupported));
        assert_eq!(StoreValue::decode("{\"a\": 1}"), Err(ValueError::Unsupported));
    }

    #[test]
    fn garbage_is_a_syntax_error() {
        assert_eq!(StoreValue::decode("not json"), Err(ValueError::Syntax));
        assert_eq!(StoreValue::decode(""), Err(ValueError::Syntax));
    }
}
