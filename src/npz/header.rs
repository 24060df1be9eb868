//! `.npy` header codec.
//!
//! Every array member of a container starts with this header. Its total
//! length is what separates the start of a member from the start of its
//! element data.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use num_traits::ToPrimitive;
use py_literal::{
    FormatError as PyValueFormatError, ParseError as PyValueParseError, Value as PyValue,
};
use std::{convert::TryFrom, io};
use thiserror::Error;

/// Magic string to indicate npy format.
const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// The total header length (including magic string, version number, header
/// length value, array format description, padding, and final newline) must be
/// evenly divisible by this value.
const HEADER_DIVISOR: usize = 64;

/// An error parsing the header of an array member.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseHeaderError {
    /// The start of the member does not match the magic string.
    #[error("start does not match magic string")]
    MagicString,
    /// The version number is not recognized.
    #[error("unknown version number: {major}.{minor}")]
    Version {
        /// Major version number.
        major: u8,
        /// Minor version number.
        minor: u8,
    },
    /// `HEADER_LEN` doesn't fit in `usize`.
    #[error("HEADER_LEN {0} does not fit in `usize`")]
    HeaderLengthOverflow(u32),
    /// The total header length, `HEADER_LEN` plus the prefix, overflows
    /// `usize`.
    #[error("total length of header with HEADER_LEN {0} overflows `usize`")]
    TotalLengthOverflow(usize),
    /// The array format string contains non-ASCII characters, which versions
    /// 1.0 and 2.0 forbid.
    #[error("non-ascii in array format string")]
    NonAscii,
    /// Error parsing a version 3.0 array format string as UTF-8.
    #[error("error parsing array format string as UTF-8: {0}")]
    Utf8Parse(#[from] std::str::Utf8Error),
    /// An unknown key was found in the metadata dictionary.
    #[error("unknown key: {0}")]
    UnknownKey(PyValue),
    /// A required key was missing from the metadata dictionary.
    #[error("missing key: {0}")]
    MissingKey(&'static str),
    /// An illegal value was found for a key in the metadata dictionary.
    #[error("illegal value for key {key}: {value}")]
    IllegalValue {
        /// The key for which the value was illegal.
        key: &'static str,
        /// The illegal value.
        value: PyValue,
    },
    /// Error parsing the metadata dictionary.
    #[error("error parsing metadata dict: {0}")]
    DictParse(#[from] PyValueParseError),
    /// The metadata is not a dictionary.
    #[error("metadata is not a dict: {0}")]
    MetaNotDict(PyValue),
    /// The header is missing a newline at the end.
    #[error("newline missing at end of header")]
    MissingNewline,
}

/// An error reading a header from a stream.
#[derive(Debug, Error)]
pub enum ReadHeaderError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The bytes read are not a valid header.
    #[error("error parsing header: {0}")]
    Parse(#[from] ParseHeaderError),
}

/// An error formatting a header for writing.
#[derive(Debug, Error)]
pub enum FormatHeaderError {
    /// The dictionary could not be formatted as a Python literal.
    #[error("error formatting Python value: {0}")]
    PyValue(#[from] PyValueFormatError),
    /// The total header length overflows `usize`, or `HEADER_LEN` exceeds the
    /// maximum encodable value.
    #[error("the header is too long")]
    HeaderTooLong,
}

#[derive(Clone, Copy)]
enum Version {
    V1_0,
    V2_0,
    V3_0,
}

impl Version {
    /// Number of bytes taken up by version number.
    const VERSION_NUM_BYTES: usize = 2;

    fn from_array(bytes: [u8; Self::VERSION_NUM_BYTES]) -> Result<Self, ParseHeaderError> {
        match bytes {
            [0x01, 0x00] => Ok(Version::V1_0),
            [0x02, 0x00] => Ok(Version::V2_0),
            [0x03, 0x00] => Ok(Version::V3_0),
            [major, minor] => Err(ParseHeaderError::Version { major, minor }),
        }
    }

    const fn major_version(self) -> u8 {
        match self {
            Version::V1_0 => 1,
            Version::V2_0 => 2,
            Version::V3_0 => 3,
        }
    }

    /// Number of bytes in representation of header length.
    const fn header_len_num_bytes(self) -> usize {
        match self {
            Version::V1_0 => 2,
            Version::V2_0 | Version::V3_0 => 4,
        }
    }

    /// Length of everything before the array format description.
    const fn prefix_len(self) -> usize {
        MAGIC_STRING.len() + Self::VERSION_NUM_BYTES + self.header_len_num_bytes()
    }

    fn read_header_len<R: io::Read>(self, mut reader: R) -> Result<usize, ReadHeaderError> {
        match self {
            Version::V1_0 => Ok(usize::from(reader.read_u16::<LittleEndian>()?)),
            Version::V2_0 | Version::V3_0 => {
                let header_len = reader.read_u32::<LittleEndian>()?;
                Ok(usize::try_from(header_len)
                    .map_err(|_| ParseHeaderError::HeaderLengthOverflow(header_len))?)
            }
        }
    }

    /// Computes the total header length and the formatted `HEADER_LEN` value.
    ///
    /// Returns `None` if the total length overflows `usize` or `HEADER_LEN`
    /// does not fit this version's length field.
    fn compute_lengths(self, unpadded_arr_format: &[u8]) -> Option<(usize, Vec<u8>)> {
        let unpadded_total_len = self
            .prefix_len()
            .checked_add(unpadded_arr_format.len())?
            .checked_add(b"\n".len())?;
        let padding_len = HEADER_DIVISOR - unpadded_total_len % HEADER_DIVISOR;
        let total_len = unpadded_total_len.checked_add(padding_len)?;
        let header_len = total_len - self.prefix_len();
        let mut formatted = vec![0; self.header_len_num_bytes()];
        match self {
            Version::V1_0 => {
                LittleEndian::write_u16(&mut formatted, u16::try_from(header_len).ok()?);
            }
            Version::V2_0 | Version::V3_0 => {
                LittleEndian::write_u32(&mut formatted, u32::try_from(header_len).ok()?);
            }
        }
        Some((total_len, formatted))
    }
}

/// Decoded array header.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Header {
    pub type_descriptor: PyValue,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl Header {
    fn from_py_value(value: PyValue) -> Result<Self, ParseHeaderError> {
        let PyValue::Dict(dict) = value else {
            return Err(ParseHeaderError::MetaNotDict(value));
        };
        let mut type_descriptor = None;
        let mut fortran_order = None;
        let mut shape = None;
        for (key, value) in dict {
            match &key {
                PyValue::String(k) if k == "descr" => type_descriptor = Some(value),
                PyValue::String(k) if k == "fortran_order" => match value {
                    PyValue::Boolean(b) => fortran_order = Some(b),
                    value => {
                        return Err(ParseHeaderError::IllegalValue { key: "fortran_order", value });
                    }
                },
                PyValue::String(k) if k == "shape" => {
                    let parsed: Option<Vec<usize>> = value
                        .as_tuple()
                        .and_then(|t| t.iter().map(|e| e.as_integer()?.to_usize()).collect());
                    match parsed {
                        Some(s) => shape = Some(s),
                        None => return Err(ParseHeaderError::IllegalValue { key: "shape", value }),
                    }
                }
                _ => return Err(ParseHeaderError::UnknownKey(key)),
            }
        }
        Ok(Self {
            type_descriptor: type_descriptor.ok_or(ParseHeaderError::MissingKey("descr"))?,
            fortran_order: fortran_order.ok_or(ParseHeaderError::MissingKey("fortran_order"))?,
            shape: shape.ok_or(ParseHeaderError::MissingKey("shape"))?,
        })
    }

    /// Reads a header from the start of `reader`.
    ///
    /// Returns the header and its total length in bytes, which is where the
    /// element data begins relative to the start of the member.
    pub(crate) fn read_from<R: io::Read>(mut reader: R) -> Result<(Self, usize), ReadHeaderError> {
        let mut magic = [0; MAGIC_STRING.len()];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_STRING {
            return Err(ParseHeaderError::MagicString.into());
        }

        let mut buf = [0; Version::VERSION_NUM_BYTES];
        reader.read_exact(&mut buf)?;
        let version = Version::from_array(buf)?;

        let header_len = version.read_header_len(&mut reader)?;
        let total_len = version
            .prefix_len()
            .checked_add(header_len)
            .ok_or(ParseHeaderError::TotalLengthOverflow(header_len))?;

        let mut buf = vec![0; header_len];
        reader.read_exact(&mut buf)?;
        let Some((&b'\n', without_newline)) = buf.split_last() else {
            return Err(ParseHeaderError::MissingNewline.into());
        };
        let header_str = match version {
            Version::V1_0 | Version::V2_0 => {
                if !without_newline.is_ascii() {
                    return Err(ParseHeaderError::NonAscii.into());
                }
                std::str::from_utf8(without_newline).map_err(ParseHeaderError::from)?
            }
            Version::V3_0 => std::str::from_utf8(without_newline).map_err(ParseHeaderError::from)?,
        };
        let arr_format = header_str.parse().map_err(ParseHeaderError::from)?;
        Ok((Self::from_py_value(arr_format)?, total_len))
    }

    fn to_py_value(&self) -> PyValue {
        PyValue::Dict(vec![
            (PyValue::String("descr".into()), self.type_descriptor.clone()),
            (PyValue::String("fortran_order".into()), PyValue::Boolean(self.fortran_order)),
            (
                PyValue::String("shape".into()),
                PyValue::Tuple(self.shape.iter().map(|&n| PyValue::Integer(n.into())).collect()),
            ),
        ])
    }

    /// Formats the header, padded so the element data that follows starts on
    /// a multiple of 64 bytes from the start of the member.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, FormatHeaderError> {
        let mut arr_format = Vec::new();
        self.to_py_value().write_ascii(&mut arr_format)?;

        let (version, (total_len, formatted_header_len)) = [Version::V1_0, Version::V2_0]
            .into_iter()
            .find_map(|version| Some((version, version.compute_lengths(&arr_format)?)))
            .ok_or(FormatHeaderError::HeaderTooLong)?;

        let mut out = Vec::with_capacity(total_len);
        out.extend_from_slice(MAGIC_STRING);
        out.push(version.major_version());
        out.push(0);
        out.extend_from_slice(&formatted_header_len);
        out.extend_from_slice(&arr_format);
        out.resize(total_len - 1, b' ');
        out.push(b'\n');
        debug_assert_eq!(out.len() % HEADER_DIVISOR, 0);
        Ok(out)
    }
}
