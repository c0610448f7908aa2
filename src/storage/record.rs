//! Expiration Records
//!
//! A value handed to the cache or the facade is stored either as-is or
//! wrapped with an absolute expiry timestamp. The two shapes are distinct
//! variants of [`Record`], so a caller's own value can never be mistaken for
//! a wrapped one no matter which fields it happens to carry.
//!
//! ## Persisted Shape
//!
//! Records are externally tagged when serialized:
//!
//! ```text
//! {"raw": <value>}
//! {"expiring": {"expirationDate": <epoch millis>, "data": <value>}}
//! ```
//!
//! Expiry is checked entirely on the client side; adapters only ever see the
//! encoded bytes.

use crate::error::{Result, StorageError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// Wall-clock time is used instead of `Instant` because expiry timestamps are
/// persisted and must remain meaningful across process restarts.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A stored value, optionally carrying an absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Record<V> {
    /// A value without TTL. Never expires.
    Raw(V),
    /// A value that expires once the clock passes `expiration_date`.
    Expiring {
        /// Absolute expiry in epoch milliseconds
        #[serde(rename = "expirationDate")]
        expiration_date: u64,
        /// The wrapped value
        data: V,
    },
}

impl<V> Record<V> {
    /// Builds a record from a value and an optional TTL.
    ///
    /// Only a positive TTL wraps the value; `None` or a zero duration stores
    /// it raw.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        match ttl {
            Some(ttl) if !ttl.is_zero() => Self::wrap(ttl, value),
            _ => Record::Raw(value),
        }
    }

    /// Wraps `value` so that it expires `ttl` from now.
    pub fn wrap(ttl: Duration, value: V) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Record::Expiring {
            expiration_date: now_millis().saturating_add(ttl_ms),
            data: value,
        }
    }

    /// Returns true if this record carries an expiry timestamp.
    #[inline]
    pub fn is_expiration_record(&self) -> bool {
        matches!(self, Record::Expiring { .. })
    }

    /// Checks if this record has expired.
    ///
    /// A read at exactly the expiry millisecond is still live.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Checks expiry against an explicit clock reading.
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self {
            Record::Raw(_) => false,
            Record::Expiring {
                expiration_date, ..
            } => now > *expiration_date,
        }
    }

    /// Returns the absolute expiry, if any.
    pub fn expiration_date(&self) -> Option<u64> {
        match self {
            Record::Raw(_) => None,
            Record::Expiring {
                expiration_date, ..
            } => Some(*expiration_date),
        }
    }

    /// Returns the remaining TTL in milliseconds, or None if no expiry.
    pub fn ttl_ms(&self) -> Option<u64> {
        self.expiration_date()
            .map(|exp| exp.saturating_sub(now_millis()))
    }

    /// Borrows the wrapped value regardless of expiry.
    pub fn data(&self) -> &V {
        match self {
            Record::Raw(data) | Record::Expiring { data, .. } => data,
        }
    }

    /// Unwraps the value regardless of expiry.
    pub fn into_data(self) -> V {
        match self {
            Record::Raw(data) | Record::Expiring { data, .. } => data,
        }
    }

    /// Unwraps the value if it is still live.
    pub fn into_live(self) -> Option<V> {
        if self.is_expired() {
            None
        } else {
            Some(self.into_data())
        }
    }
}

/// Encodes a record for an adapter.
pub fn encode(record: &Record<Value>) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(record)?))
}

/// Decodes a record read from an adapter under `key`.
pub fn decode(key: &str, bytes: &[u8]) -> Result<Record<Value>> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_without_ttl_is_raw() {
        assert_eq!(Record::new(1, None), Record::Raw(1));
        assert_eq!(Record::new(1, Some(Duration::ZERO)), Record::Raw(1));
    }

    #[test]
    fn test_wrap_records_absolute_expiry() {
        let before = now_millis();
        let record = Record::wrap(Duration::from_millis(500), "v");
        let exp = record.expiration_date().unwrap();

        assert!(record.is_expiration_record());
        assert!(exp >= before + 500);
        assert!(exp <= now_millis() + 500);
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let record = Record::Expiring {
            expiration_date: 1_000,
            data: (),
        };
        assert!(!record.is_expired_at(999));
        assert!(!record.is_expired_at(1_000));
        assert!(record.is_expired_at(1_001));
    }

    #[test]
    fn test_raw_never_expires() {
        assert!(!Record::Raw(()).is_expired_at(u64::MAX));
        assert_eq!(Record::Raw(()).ttl_ms(), None);
    }

    #[test]
    fn test_into_live() {
        let live = Record::wrap(Duration::from_secs(60), 7);
        assert_eq!(live.into_live(), Some(7));

        let dead = Record::Expiring {
            expiration_date: 0,
            data: 7,
        };
        assert_eq!(dead.into_live(), None);
    }

    #[test]
    fn test_lookalike_value_stays_raw() {
        // A caller value with the same field names as a wrapped record
        let lookalike = json!({"expirationDate": 0, "data": "x"});
        let record = Record::new(lookalike.clone(), None);

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: Record<Value> = serde_json::from_str(&encoded).unwrap();

        assert!(!decoded.is_expiration_record());
        assert_eq!(decoded.into_live(), Some(lookalike));
    }

    #[test]
    fn test_serialized_shape() {
        let record = Record::Expiring {
            expiration_date: 42,
            data: json!("v"),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"expiring": {"expirationDate": 42, "data": "v"}})
        );
        assert_eq!(
            serde_json::to_value(Record::Raw(json!(1))).unwrap(),
            json!({"raw": 1})
        );
    }

    #[test]
    fn test_decode_rejects_untagged() {
        let err = decode("k", br#""plain""#).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == "k"));

        let record = decode("k", &encode(&Record::Raw(json!([1, 2]))).unwrap()).unwrap();
        assert_eq!(record, Record::Raw(json!([1, 2])));
    }
}
