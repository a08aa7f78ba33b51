//! Byte size budget with binary units

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size in bytes, used as the budget of a [`BulkBody`](crate::BulkBody).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

impl ByteSize {
    pub const KB: ByteSize = ByteSize(1 << 10);
    pub const MB: ByteSize = ByteSize(1 << 20);
    pub const GB: ByteSize = ByteSize(1 << 30);

    pub const fn bytes(n: u64) -> Self {
        Self(n)
    }

    /// Unit constructors saturate at `u64::MAX` bytes.
    pub const fn kb(n: u64) -> Self {
        Self(n.saturating_mul(Self::KB.0))
    }

    pub const fn mb(n: u64) -> Self {
        Self(n.saturating_mul(Self::MB.0))
    }

    pub const fn gb(n: u64) -> Self {
        Self(n.saturating_mul(Self::GB.0))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// Largest unit first
const UNITS: [(&str, u64); 3] = [
    ("GB", ByteSize::GB.0),
    ("MB", ByteSize::MB.0),
    ("KB", ByteSize::KB.0),
];

impl fmt::Display for ByteSize {
    /// Renders in the largest unit that keeps at most one decimal place exact,
    /// e.g. `5MB`, `1.5KB`, `1000B`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, unit) in UNITS {
            let scaled = u128::from(self.0) * 10;
            if self.0 >= unit && scaled % u128::from(unit) == 0 {
                let tenths = scaled / u128::from(unit);
                return if tenths % 10 == 0 {
                    write!(f, "{}{suffix}", tenths / 10)
                } else {
                    write!(f, "{}.{}{suffix}", tenths / 10, tenths % 10)
                };
            }
        }
        write!(f, "{}B", self.0)
    }
}

/// Error parsing a [`ByteSize`] from text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSizeError(String);

impl fmt::Display for ParseSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid byte size {:?} (expected e.g. 512, 10KB, 5MB)", self.0)
    }
}

impl std::error::Error for ParseSizeError {}

impl FromStr for ByteSize {
    type Err = ParseSizeError;

    /// Parse `512`, `512B`, `10kb`, `1.5 MB`, `2G`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSizeError(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (num, suffix) = trimmed.split_at(split);
        if num.is_empty() {
            return Err(err());
        }

        let unit = match suffix.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" => ByteSize::KB.0,
            "M" | "MB" => ByteSize::MB.0,
            "G" | "GB" => ByteSize::GB.0,
            _ => return Err(err()),
        };

        if let Ok(n) = num.parse::<u64>() {
            return n.checked_mul(unit).map(Self).ok_or_else(err);
        }
        let value: f64 = num.parse().map_err(|_| err())?;
        let bytes = value * unit as f64;
        if !bytes.is_finite() || bytes > u64::MAX as f64 {
            return Err(err());
        }
        Ok(Self(bytes.round() as u64))
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    /// Accepts either an integer byte count or a string with a unit suffix.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bytes(n) => Ok(Self(n)),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_multipliers() {
        assert_eq!(ByteSize::KB.as_u64(), 1024);
        assert_eq!(ByteSize::MB.as_u64(), 1024 * 1024);
        assert_eq!(ByteSize::GB.as_u64(), 1024 * 1024 * 1024);
        assert_eq!(ByteSize::kb(1), ByteSize::KB);
        assert_eq!(ByteSize::mb(5).as_u64(), 5 * 1024 * 1024);
    }

    #[test]
    fn unit_constructors_saturate() {
        assert_eq!(ByteSize::kb(u64::MAX).as_u64(), u64::MAX);
        assert_eq!(ByteSize::gb(1 << 40).as_u64(), u64::MAX);
        assert_eq!(ByteSize::gb(4), ByteSize::bytes(4 << 30));
    }

    #[test]
    fn parse_plain_bytes() {
        assert_eq!("512".parse::<ByteSize>().unwrap(), ByteSize::bytes(512));
        assert_eq!("512B".parse::<ByteSize>().unwrap(), ByteSize::bytes(512));
    }

    #[test]
    fn parse_units_case_insensitive() {
        assert_eq!("10KB".parse::<ByteSize>().unwrap(), ByteSize::kb(10));
        assert_eq!("10kb".parse::<ByteSize>().unwrap(), ByteSize::kb(10));
        assert_eq!("5 MB".parse::<ByteSize>().unwrap(), ByteSize::mb(5));
        assert_eq!("2G".parse::<ByteSize>().unwrap(), ByteSize::gb(2));
    }

    #[test]
    fn parse_fractional() {
        assert_eq!("1.5KB".parse::<ByteSize>().unwrap(), ByteSize::bytes(1536));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<ByteSize>().is_err());
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("5TB".parse::<ByteSize>().is_err());
        assert!("five".parse::<ByteSize>().is_err());
    }

    #[test]
    fn display_largest_unit() {
        assert_eq!(ByteSize::mb(5).to_string(), "5MB");
        assert_eq!(ByteSize::bytes(1536).to_string(), "1.5KB");
        assert_eq!(ByteSize::bytes(1000).to_string(), "1000B");
        assert_eq!(ByteSize::bytes(0).to_string(), "0B");
    }

    #[test]
    fn deserialize_string_or_int() {
        #[derive(Deserialize)]
        struct Wrap {
            size: ByteSize,
        }
        let w: Wrap = serde_json::from_str(r#"{"size": "8MB"}"#).unwrap();
        assert_eq!(w.size, ByteSize::mb(8));
        let w: Wrap = serde_json::from_str(r#"{"size": 4096}"#).unwrap();
        assert_eq!(w.size, ByteSize::kb(4));
    }
}
