//! Size token grammar
//!
//! A size token is one of:
//!
//! | token | meaning |
//! |---|---|
//! | `<int>k` / `<int>K` | kibibytes / kilobytes |
//! | `<int>m` / `<int>M` | mebibytes / megabytes |
//! | `<int>g` / `<int>G` | gibibytes / gigabytes |
//! | `<int>t` / `<int>T` | tebibytes / terabytes |
//! | `<int>` | a raw extent count |
//! | `<NN>%FREE`, `<NN>%VG`, `<NN>%PVS` | a pool-relative directive, resolved by LVM |
//!
//! Lowercase suffixes are binary multipliers, uppercase are decimal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const POOL_BASES: [&str; 3] = ["FREE", "VG", "PVS"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeParseError {
    #[error("size must not be empty")]
    Empty,

    #[error(
        "invalid size '{0}': expected <int>[kKmMgGtT], a bare extent count or <NN>%{{FREE|VG|PVS}}"
    )]
    Invalid(String),

    #[error("size '{0}' does not fit in a 64-bit byte count")]
    Overflow(String),
}

/// Unit suffix of an absolute size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeUnit {
    Kibibytes,
    Kilobytes,
    Mebibytes,
    Megabytes,
    Gibibytes,
    Gigabytes,
    Tebibytes,
    Terabytes,
}

impl SizeUnit {
    pub const ALL: [SizeUnit; 8] = [
        SizeUnit::Kibibytes,
        SizeUnit::Kilobytes,
        SizeUnit::Mebibytes,
        SizeUnit::Megabytes,
        SizeUnit::Gibibytes,
        SizeUnit::Gigabytes,
        SizeUnit::Tebibytes,
        SizeUnit::Terabytes,
    ];

    pub fn suffix(self) -> char {
        match self {
            Self::Kibibytes => 'k',
            Self::Kilobytes => 'K',
            Self::Mebibytes => 'm',
            Self::Megabytes => 'M',
            Self::Gibibytes => 'g',
            Self::Gigabytes => 'G',
            Self::Tebibytes => 't',
            Self::Terabytes => 'T',
        }
    }

    pub fn multiplier(self) -> u64 {
        match self {
            Self::Kibibytes => 1 << 10,
            Self::Kilobytes => 1_000,
            Self::Mebibytes => 1 << 20,
            Self::Megabytes => 1_000_000,
            Self::Gibibytes => 1 << 30,
            Self::Gigabytes => 1_000_000_000,
            Self::Tebibytes => 1 << 40,
            Self::Terabytes => 1_000_000_000_000,
        }
    }

    pub fn from_suffix(suffix: char) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.suffix() == suffix)
    }
}

/// Parsed size token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// Absolute size with a unit suffix
    Sized { value: u64, unit: SizeUnit },

    /// Bare integer, already an extent count
    Extents(u64),

    /// Percentage of free space, group size or PV size; kept verbatim
    PoolRelative(String),
}

impl SizeSpec {
    pub fn parse(token: &str) -> Result<Self, SizeParseError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SizeParseError::Empty);
        }

        if let Some((percent, base)) = token.split_once('%') {
            let percent_ok = (percent.len() == 2 && is_digits(percent)) || percent == "100";
            if percent_ok && POOL_BASES.contains(&base) {
                return Ok(Self::PoolRelative(token.to_string()));
            }
            return Err(SizeParseError::Invalid(token.to_string()));
        }

        if is_digits(token) {
            let extents = token
                .parse()
                .map_err(|_| SizeParseError::Overflow(token.to_string()))?;
            return Ok(Self::Extents(extents));
        }

        let mut chars = token.chars();
        let unit = chars
            .next_back()
            .and_then(SizeUnit::from_suffix)
            .ok_or_else(|| SizeParseError::Invalid(token.to_string()))?;
        let digits = chars.as_str();
        if !is_digits(digits) {
            return Err(SizeParseError::Invalid(token.to_string()));
        }

        let value: u64 = digits
            .parse()
            .map_err(|_| SizeParseError::Overflow(token.to_string()))?;
        if value.checked_mul(unit.multiplier()).is_none() {
            return Err(SizeParseError::Overflow(token.to_string()));
        }

        Ok(Self::Sized { value, unit })
    }

    /// Byte count of an absolute size, `None` for extent counts and
    /// pool-relative directives.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            // parse() rejects tokens whose product overflows
            Self::Sized { value, unit } => Some(value.saturating_mul(unit.multiplier())),
            Self::Extents(_) | Self::PoolRelative(_) => None,
        }
    }

    pub fn is_pool_relative(&self) -> bool {
        matches!(self, Self::PoolRelative(_))
    }

    /// The lvcreate size option and its value: `-L` for absolute sizes,
    /// `-l` for extent counts and pool-relative directives.
    pub fn create_argument(&self) -> (&'static str, String) {
        match self {
            Self::Sized { .. } => ("-L", self.to_string()),
            Self::Extents(_) | Self::PoolRelative(_) => ("-l", self.to_string()),
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sized { value, unit } => write!(f, "{}{}", value, unit.suffix()),
            Self::Extents(extents) => write!(f, "{}", extents),
            Self::PoolRelative(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for SizeSpec {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
