//! Canonical byte encodings for column value types.
//!
//! Every supported type has exactly one encoding so that ciphertexts, MACs
//! and blind indexes are reproducible across implementations:
//!
//! | Type                      | Encoding                                   |
//! |---------------------------|--------------------------------------------|
//! | `String`                  | UTF-8 bytes                                |
//! | `Vec<u8>`                 | the bytes themselves                       |
//! | `bool`                    | one byte, `0` or `1`                       |
//! | `i64`                     | 8 bytes, little-endian                     |
//! | `f64`                     | IEEE-754 bits, 8 bytes, little-endian      |
//! | `DateTime<Utc>` / `<FixedOffset>` | Go `time.Time` binary layout (below) |
//! | [`Json<T>`]               | compact JSON text of `T`                   |
//!
//! The time layout is `[version][sec: i64 BE][nsec: i32 BE][offset_min: i16 BE]`
//! with `sec` counted from 0001-01-01T00:00:00Z, `offset_min == -1` meaning
//! UTC, and version 2 appending one byte of offset seconds.

use crate::error::Error;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Seconds between 0001-01-01T00:00:00Z and the Unix epoch.
const UNIX_TO_INTERNAL: i64 = 62_135_596_800;

const TIME_V1: u8 = 1;
const TIME_V2: u8 = 2;
const TIME_V1_LEN: usize = 15;
const TIME_V2_LEN: usize = 16;
const UTC_OFFSET_MARKER: i16 = -1;

/// A value that can be stored in an encrypted or digested column.
pub trait ColumnType: Sized {
    /// Canonical bytes of the value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the value has no representation (for
    /// example a timestamp whose offset truncates to `-1` minutes, which
    /// would read back as UTC).
    fn to_bytes(&self) -> Result<Vec<u8>, Error>;

    /// Parses canonical bytes back into a value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` when the bytes are not a valid encoding.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Error>;
}

impl ColumnType for String {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.as_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_utf8(bytes.to_vec()).map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))
    }
}

impl ColumnType for Vec<u8> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.clone())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(bytes.to_vec())
    }
}

impl ColumnType for bool {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(vec![u8::from(*self)])
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            other => Err(Error::Decode(format!("invalid bool encoding: {other:?}"))),
        }
    }
}

impl ColumnType for i64 {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.to_le_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_le_bytes(fixed::<8>(bytes, "i64")?))
    }
}

impl ColumnType for f64 {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.to_bits().to_le_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_bits(u64::from_le_bytes(fixed::<8>(bytes, "f64")?)))
    }
}

impl ColumnType for DateTime<Utc> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        encode_time(self.timestamp(), self.timestamp_subsec_nanos(), None)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (secs, nanos, _) = decode_time(bytes)?;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(|| Error::Decode("timestamp out of range".to_string()))
    }
}

impl ColumnType for DateTime<FixedOffset> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        encode_time(
            self.timestamp(),
            self.timestamp_subsec_nanos(),
            Some(self.offset().local_minus_utc()),
        )
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (secs, nanos, offset) = decode_time(bytes)?;
        let offset = FixedOffset::east_opt(offset.unwrap_or(0))
            .ok_or_else(|| Error::Decode("offset out of range".to_string()))?;
        offset
            .timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(|| Error::Decode("timestamp out of range".to_string()))
    }
}

/// Structured value stored as its JSON serialization.
///
/// # Example
///
/// ```
/// use piiguard::convert::{ColumnType, Json};
/// use std::collections::BTreeMap;
///
/// let address: Json<BTreeMap<String, String>> = Json(BTreeMap::from([
///     ("city".to_string(), "Bandung".to_string()),
///     ("zip".to_string(), "40115".to_string()),
/// ]));
/// let bytes = address.to_bytes().unwrap();
/// assert_eq!(bytes, br#"{"city":"Bandung","zip":"40115"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + DeserializeOwned> ColumnType for Json<T> {
    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(&self.0).map_err(|e| Error::Decode(format!("JSON encoding failed: {e}")))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes)
            .map(Json)
            .map_err(|e| Error::Decode(format!("invalid JSON: {e}")))
    }
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], Error> {
    bytes.try_into().map_err(|_| {
        Error::Decode(format!("{what} needs {N} bytes, got {}", bytes.len()))
    })
}

// `offset_secs == None` encodes UTC.
fn encode_time(unix_secs: i64, nanos: u32, offset_secs: Option<i32>) -> Result<Vec<u8>, Error> {
    let (offset_min, offset_sec) = match offset_secs {
        None => (UTC_OFFSET_MARKER, 0),
        Some(secs) => {
            let minutes = i16::try_from(secs / 60)
                .ok()
                .filter(|m| *m != UTC_OFFSET_MARKER)
                .ok_or_else(|| Error::Decode(format!("unexpected zone offset {secs}s")))?;
            #[allow(clippy::cast_possible_truncation)]
            (minutes, (secs % 60) as i8)
        }
    };
    let internal_secs = unix_secs
        .checked_add(UNIX_TO_INTERNAL)
        .ok_or_else(|| Error::Decode("timestamp out of range".to_string()))?;
    let version = if offset_sec == 0 { TIME_V1 } else { TIME_V2 };

    let mut out = Vec::with_capacity(TIME_V2_LEN);
    out.push(version);
    out.extend_from_slice(&internal_secs.to_be_bytes());
    #[allow(clippy::cast_possible_wrap)]
    out.extend_from_slice(&(nanos as i32).to_be_bytes());
    out.extend_from_slice(&offset_min.to_be_bytes());
    if version == TIME_V2 {
        out.extend_from_slice(&offset_sec.to_be_bytes());
    }
    Ok(out)
}

fn decode_time(bytes: &[u8]) -> Result<(i64, u32, Option<i32>), Error> {
    let expected = match bytes.first() {
        Some(&TIME_V1) => TIME_V1_LEN,
        Some(&TIME_V2) => TIME_V2_LEN,
        Some(v) => return Err(Error::Decode(format!("unsupported time encoding version {v}"))),
        None => return Err(Error::Decode("empty time encoding".to_string())),
    };
    if bytes.len() != expected {
        return Err(Error::Decode(format!(
            "time encoding needs {expected} bytes, got {}",
            bytes.len()
        )));
    }

    let secs = i64::from_be_bytes(fixed::<8>(&bytes[1..9], "time seconds")?)
        .checked_sub(UNIX_TO_INTERNAL)
        .ok_or_else(|| Error::Decode("time seconds out of range".to_string()))?;
    let nanos = i32::from_be_bytes(fixed::<4>(&bytes[9..13], "time nanoseconds")?);
    let nanos = u32::try_from(nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| Error::Decode(format!("invalid nanoseconds {nanos}")))?;
    let offset_min = i16::from_be_bytes(fixed::<2>(&bytes[13..15], "time offset")?);

    let offset = if offset_min == UTC_OFFSET_MARKER {
        None
    } else {
        let extra = if bytes[0] == TIME_V2 { i32::from(bytes[15] as i8) } else { 0 };
        Some(i32::from(offset_min) * 60 + extra)
    };

    Ok((secs, nanos, offset))
}
