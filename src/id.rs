//! Row identifiers
//!
//! A 64-bit, roughly time-ordered identifier. Zero is reserved as the
//! "invalid" sentinel and never identifies a real row.
//!
//! ## Bit Layout
//! ```text
//! ┌──────┬──────────────────────────┬──────────────────┬─────────────┐
//! │ 0 (1)│ ms since EPOCH_MS (43)   │ random/counter   │ version (4) │
//! │      │                          │ (16)             │             │
//! └──────┴──────────────────────────┴──────────────────┴─────────────┘
//! ```
//!
//! ## Text Form
//! 11 characters over an ASCII-ordered base64 alphabet, so comparing two
//! encoded ids as strings gives the same answer as comparing the numbers.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{const_mutex, Mutex};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TableError;

/// 2024-01-01T00:00:00Z in unix milliseconds
pub const EPOCH_MS: u64 = 1_704_067_200_000;

/// Version stamped into the low bits of generated ids
pub const ID_VERSION: u64 = 1;

const ENCODED_LEN: usize = 11;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Identifier of a row within a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

struct Generator {
    last_ms: u64,
    counter: u16,
}

static GENERATOR: Mutex<Generator> = const_mutex(Generator {
    last_ms: u64::MAX,
    counter: 0,
});

impl Id {
    /// The reserved invalid id
    pub const ZERO: Id = Id(0);

    /// Wrap an explicit value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Generate a new time-based id
    ///
    /// Within one millisecond the 16-bit counter is incremented; a new
    /// millisecond reseeds it randomly. Ids are increasing within a process
    /// as long as the wall clock does not step backwards.
    pub fn generate() -> Self {
        let ms = millis_since_epoch(SystemTime::now());

        let mut state = GENERATOR.lock();
        if ms == state.last_ms {
            state.counter = state.counter.wrapping_add(1);
        } else {
            state.last_ms = ms;
            state.counter = rand::random();
        }

        Self::from_parts(ms, state.counter, ID_VERSION)
    }

    /// Build an id for a specific instant with random low bits
    ///
    /// Useful for migrations and tests.
    pub fn at(time: SystemTime) -> Self {
        Self::from_parts(millis_since_epoch(time), rand::random(), ID_VERSION)
    }

    fn from_parts(ms: u64, random_bits: u16, version: u64) -> Self {
        // 43 bits of milliseconds keeps bit 63 clear
        let ms = ms & ((1 << 43) - 1);
        Self((ms << 20) | (u64::from(random_bits) << 4) | (version & 0xF))
    }

    /// Raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Milliseconds since [`EPOCH_MS`] encoded in the id
    pub fn timestamp_ms(self) -> u64 {
        self.0 >> 20
    }

    /// Wall-clock time encoded in the id
    pub fn time(self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(EPOCH_MS + self.timestamp_ms())
    }

    pub fn version(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    pub fn random_bits(self) -> u16 {
        ((self.0 >> 4) & 0xFFFF) as u16
    }

    /// Decode the 11-character text form
    pub fn decode(s: &str) -> Result<Self, TableError> {
        let bytes = s.as_bytes();
        if bytes.len() != ENCODED_LEN {
            return Err(TableError::InvalidId(format!(
                "invalid length: got {}, want {}",
                bytes.len(),
                ENCODED_LEN
            )));
        }

        let mut value: u64 = 0;
        for (pos, &c) in bytes.iter().enumerate() {
            let digit = decode_char(c).ok_or_else(|| {
                TableError::InvalidId(format!(
                    "invalid character at position {}: {:?}",
                    pos, c as char
                ))
            })?;
            // The leading character only carries 4 bits
            if pos == 0 && digit > 0xF {
                return Err(TableError::InvalidId(format!("{:?} overflows 64 bits", s)));
            }
            value = (value << 6) | u64::from(digit);
        }
        Ok(Self(value))
    }
}

fn millis_since_epoch(time: SystemTime) -> u64 {
    let unix_ms = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    unix_ms.saturating_sub(EPOCH_MS)
}

fn decode_char(c: u8) -> Option<u8> {
    match c {
        b'-' => Some(0),
        b'0'..=b'9' => Some(c - b'0' + 1),
        b'A'..=b'Z' => Some(c - b'A' + 11),
        b'_' => Some(37),
        b'a'..=b'z' => Some(c - b'a' + 38),
        _ => None,
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Id> for u64 {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; ENCODED_LEN];
        let mut v = self.0;
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(v & 0x3F) as usize];
            v >>= 6;
        }
        // ALPHABET is ASCII
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Id {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_zero() {
            serializer.serialize_str("")
        } else {
            serializer.collect_str(self)
        }
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an 11-character id string or an unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        if v.is_empty() {
            return Ok(Id::ZERO);
        }
        Id::decode(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
        Ok(Id(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
        u64::try_from(v)
            .map(Id)
            .map_err(|_| E::custom("negative id"))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}
