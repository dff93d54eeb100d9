// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag descriptors and address-option parsing.
//!
//! A tag is a single addressable datum on a device. The address string is
//! driver-specific and opaque to the broker except for two lazily parsed
//! suffixes: the last `.` introduces a length/encoding pair (STRING, BYTES)
//! or a bit index (BIT), and the last `#` introduces an endianness override
//! for 16/32/64-bit numeric types.

use crate::error::ErrorCode;
use crate::limits;
use crate::value::DataType;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Access attributes of a tag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagAttr: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const SUBSCRIBE = 0x04;
        /// Value comes from the subscription's static set, never the device.
        const STATIC = 0x08;
    }
}

// Persisted as the raw bit pattern; unknown bits from newer writers are
// dropped rather than rejected.
impl Serialize for TagAttr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagAttr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(TagAttr::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

impl TagAttr {
    /// Readable means the polling scheduler will pick the tag up.
    pub fn is_readable(self) -> bool {
        self.intersects(TagAttr::READ | TagAttr::SUBSCRIBE)
    }
}

/// Byte order of a 16-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ByteOrder16 {
    B,
    #[default]
    L,
}

/// Byte order of a 32-bit quantity, word-then-byte granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ByteOrder32 {
    BB,
    BL,
    #[default]
    LL,
    LB,
}

/// Byte order of a 64-bit quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ByteOrder64 {
    B,
    #[default]
    L,
}

/// String byte layout within device registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StrEncoding {
    /// High byte first.
    #[default]
    H,
    /// Low byte first.
    L,
    /// One char per register, high byte.
    D,
    /// One char per register, low byte.
    E,
}

/// Address-decoding options parsed from the address string suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AddrOption {
    #[default]
    None,
    Bit {
        index: u8,
    },
    Str {
        length: u16,
        encoding: StrEncoding,
    },
    Bytes {
        length: u16,
    },
    Order16(ByteOrder16),
    Order32(ByteOrder32),
    Order64(ByteOrder64),
}

/// A single readable/writable datum exposed by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub attribute: TagAttr,
    /// Decimal digits reported for floating values, 0..=17.
    #[serde(default)]
    pub precision: u8,
    /// Multiplicative scale applied after reading.
    #[serde(default)]
    pub decimal: f64,
    /// Additive bias applied after scaling.
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub description: String,
    /// Driver-opaque metadata blob, at most 20 bytes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<u8>,
    /// Small display-format descriptor, at most 16 bytes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<u8>,
}

impl Tag {
    pub fn new(name: impl Into<String>, address: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            data_type,
            attribute: TagAttr::READ,
            precision: 0,
            decimal: 0.0,
            bias: 0.0,
            description: String::new(),
            meta: Vec::new(),
            format: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: TagAttr) -> Self {
        self.attribute = attribute;
        self
    }

    /// Structural validation against the configuration limits.
    pub fn validate(&self) -> Result<(), ErrorCode> {
        if !limits::name_fits(&self.name, limits::TAG_NAME_LEN) {
            return Err(ErrorCode::TagNameTooLong);
        }
        if self.precision > limits::TAG_PRECISION_MAX {
            return Err(ErrorCode::TagPrecisionInvalid);
        }
        if self.meta.len() > limits::TAG_META_LEN {
            return Err(ErrorCode::TagMetaTooLong);
        }
        if self.format.len() > limits::TAG_FORMAT_LEN {
            return Err(ErrorCode::TagFormatTooLong);
        }
        // Suffix errors surface at configuration time, not at first poll
        self.parse_addr_option()?;
        Ok(())
    }

    /// Parse the address-decoding option for this tag's type.
    pub fn parse_addr_option(&self) -> Result<AddrOption, ErrorCode> {
        parse_addr_option(&self.address, self.data_type)
    }
}

/// Parse address-decoding options from an address string.
///
/// STRING/BYTES require a trailing `.<len>[HLDE]`, BIT a trailing `.<index>`;
/// 16/32/64-bit numerics accept an optional `#<order>` suffix.
pub fn parse_addr_option(address: &str, data_type: DataType) -> Result<AddrOption, ErrorCode> {
    match data_type {
        DataType::Bit => {
            let suffix = dot_suffix(address).ok_or(ErrorCode::TagAddressFormatInvalid)?;
            let index = suffix
                .parse::<u8>()
                .map_err(|_| ErrorCode::TagAddressFormatInvalid)?;
            Ok(AddrOption::Bit { index })
        }
        DataType::String => {
            let suffix = dot_suffix(address).ok_or(ErrorCode::TagAddressFormatInvalid)?;
            let (digits, tail) = split_digits(suffix);
            let length = digits
                .parse::<u16>()
                .map_err(|_| ErrorCode::TagAddressFormatInvalid)?;
            let encoding = match tail {
                "" | "H" => StrEncoding::H,
                "L" => StrEncoding::L,
                "D" => StrEncoding::D,
                "E" => StrEncoding::E,
                _ => return Err(ErrorCode::TagAddressFormatInvalid),
            };
            Ok(AddrOption::Str { length, encoding })
        }
        DataType::Bytes => {
            let suffix = dot_suffix(address).ok_or(ErrorCode::TagAddressFormatInvalid)?;
            let length = suffix
                .parse::<u16>()
                .map_err(|_| ErrorCode::TagAddressFormatInvalid)?;
            Ok(AddrOption::Bytes { length })
        }
        _ => match data_type.bit_width() {
            Some(16) => match hash_suffix(address) {
                None | Some("L") => Ok(AddrOption::Order16(ByteOrder16::L)),
                Some("B") => Ok(AddrOption::Order16(ByteOrder16::B)),
                Some(_) => Err(ErrorCode::TagAddressFormatInvalid),
            },
            Some(32) => match hash_suffix(address) {
                None | Some("LL") => Ok(AddrOption::Order32(ByteOrder32::LL)),
                Some("BB") => Ok(AddrOption::Order32(ByteOrder32::BB)),
                Some("BL") => Ok(AddrOption::Order32(ByteOrder32::BL)),
                Some("LB") => Ok(AddrOption::Order32(ByteOrder32::LB)),
                Some(_) => Err(ErrorCode::TagAddressFormatInvalid),
            },
            Some(64) => match hash_suffix(address) {
                None | Some("L") => Ok(AddrOption::Order64(ByteOrder64::L)),
                Some("B") => Ok(AddrOption::Order64(ByteOrder64::B)),
                Some(_) => Err(ErrorCode::TagAddressFormatInvalid),
            },
            _ => Ok(AddrOption::None),
        },
    }
}

fn dot_suffix(address: &str) -> Option<&str> {
    address.rsplit_once('.').map(|(_, s)| s).filter(|s| !s.is_empty())
}

fn hash_suffix(address: &str) -> Option<&str> {
    address.rsplit_once('#').map(|(_, s)| s).filter(|s| !s.is_empty())
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

#[cfg(test)]
#[path = "tag_tests.rs"]
mod tests;
