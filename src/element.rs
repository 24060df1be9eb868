//! On-disk element representations and their Rust counterparts.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
#[cfg(feature = "num-complex")]
use num_complex::Complex;
use std::fmt;

/// Byte order of multi-byte elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl Endian {
    /// Byte order of the target platform.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;
    /// Byte order of the target platform.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;
}

/// The closed set of scalar kinds a dataset can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// Complex number made of two `f32`.
    C64,
    /// Complex number made of two `f64`.
    C128,
}

impl ScalarKind {
    /// Size of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 | Self::C64 => 8,
            Self::C128 => 16,
        }
    }

    /// Type code used in `.npy` descriptors.
    const fn type_code(self) -> char {
        match self {
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 'i',
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => 'u',
            Self::F32 | Self::F64 => 'f',
            Self::C64 | Self::C128 => 'c',
        }
    }

    fn from_type_code(code: char, width: usize) -> Option<Self> {
        Some(match (code, width) {
            ('i', 1) => Self::I8,
            ('i', 2) => Self::I16,
            ('i', 4) => Self::I32,
            ('i', 8) => Self::I64,
            ('u', 1) => Self::U8,
            ('u', 2) => Self::U16,
            ('u', 4) => Self::U32,
            ('u', 8) => Self::U64,
            ('f', 4) => Self::F32,
            ('f', 8) => Self::F64,
            ('c', 8) => Self::C64,
            ('c', 16) => Self::C128,
            _ => return None,
        })
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::C64 => "c64",
            Self::C128 => "c128",
        };
        f.write_str(name)
    }
}

/// Element representation recorded for a dataset: the scalar kind plus the
/// byte order it is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementType {
    kind: ScalarKind,
    order: Endian,
}

impl ElementType {
    /// Creates an element type.
    pub const fn new(kind: ScalarKind, order: Endian) -> Self {
        Self { kind, order }
    }

    /// Element type of `A` stored in native byte order.
    pub const fn native<A: Element>() -> Self {
        Self::new(A::KIND, Endian::NATIVE)
    }

    /// The type tag.
    pub const fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// The byte order.
    pub const fn order(&self) -> Endian {
        self.order
    }

    /// Size of one element in bytes.
    pub const fn width(&self) -> usize {
        self.kind.width()
    }

    /// Parses a `.npy` type descriptor such as `<f8` or `|u1`.
    ///
    /// Returns `None` for descriptors outside the supported set.
    pub fn from_descriptor(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = match chars.next()? {
            '<' => Endian::Little,
            '>' => Endian::Big,
            '=' | '|' => Endian::NATIVE,
            _ => return None,
        };
        let code = chars.next()?;
        let width = chars.as_str().parse().ok()?;
        let kind = ScalarKind::from_type_code(code, width)?;
        Some(Self::new(kind, order))
    }

    /// Formats the `.npy` type descriptor of this element type.
    pub fn descriptor(&self) -> String {
        let order = match (self.width(), self.order) {
            (1, _) => '|',
            (_, Endian::Little) => '<',
            (_, Endian::Big) => '>',
        };
        format!("{order}{}{}", self.kind.type_code(), self.width())
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.width(), self.order) {
            (1, _) => write!(f, "{}", self.kind),
            (_, Endian::Little) => write!(f, "{} (little-endian)", self.kind),
            (_, Endian::Big) => write!(f, "{} (big-endian)", self.kind),
        }
    }
}

/// A dynamically typed element value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// Any signed integer kind.
    Int(i64),
    /// Any unsigned integer kind.
    UInt(u64),
    /// Any floating point kind.
    Float(f64),
    /// Any complex kind.
    #[cfg(feature = "num-complex")]
    Complex(Complex<f64>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            #[cfg(feature = "num-complex")]
            Self::Complex(v) => write!(f, "{v}"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust type that can be read from and written to mapped bytes.
///
/// Every implementor is plain old data: all bit patterns of
/// `size_of::<Self>()` bytes are valid values. The trait is sealed so that
/// this holds for every type a view can be created for.
pub trait Element: Copy + sealed::Sealed + 'static {
    /// The scalar kind this type corresponds to.
    const KIND: ScalarKind;

    /// Decodes one element from exactly `KIND.width()` bytes.
    fn decode(bytes: &[u8], order: Endian) -> Self;

    /// Encodes the element into exactly `KIND.width()` bytes.
    fn encode(self, bytes: &mut [u8], order: Endian);

    /// Converts the element into a [`Value`].
    fn into_value(self) -> Value;
}

macro_rules! impl_byte_element {
    ($elem:ty, $kind:ident, $variant:ident) => {
        impl sealed::Sealed for $elem {}

        impl Element for $elem {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn decode(bytes: &[u8], _order: Endian) -> Self {
                <$elem>::from_ne_bytes([bytes[0]])
            }

            fn encode(self, bytes: &mut [u8], _order: Endian) {
                bytes[0] = self.to_ne_bytes()[0];
            }

            fn into_value(self) -> Value {
                Value::$variant(self.into())
            }
        }
    };
}

macro_rules! impl_multi_byte_element {
    ($elem:ty, $kind:ident, $variant:ident, $read:ident, $write:ident) => {
        impl sealed::Sealed for $elem {}

        impl Element for $elem {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn decode(bytes: &[u8], order: Endian) -> Self {
                match order {
                    Endian::Little => LittleEndian::$read(bytes),
                    Endian::Big => BigEndian::$read(bytes),
                }
            }

            fn encode(self, bytes: &mut [u8], order: Endian) {
                match order {
                    Endian::Little => LittleEndian::$write(bytes, self),
                    Endian::Big => BigEndian::$write(bytes, self),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self.into())
            }
        }
    };
}

impl_byte_element!(i8, I8, Int);
impl_byte_element!(u8, U8, UInt);
impl_multi_byte_element!(i16, I16, Int, read_i16, write_i16);
impl_multi_byte_element!(i32, I32, Int, read_i32, write_i32);
impl_multi_byte_element!(i64, I64, Int, read_i64, write_i64);
impl_multi_byte_element!(u16, U16, UInt, read_u16, write_u16);
impl_multi_byte_element!(u32, U32, UInt, read_u32, write_u32);
impl_multi_byte_element!(u64, U64, UInt, read_u64, write_u64);
impl_multi_byte_element!(f32, F32, Float, read_f32, write_f32);
impl_multi_byte_element!(f64, F64, Float, read_f64, write_f64);

#[cfg(feature = "num-complex")]
macro_rules! impl_complex_element {
    ($float:ty, $kind:ident) => {
        impl sealed::Sealed for Complex<$float> {}

        impl Element for Complex<$float> {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn decode(bytes: &[u8], order: Endian) -> Self {
                let (re, im) = bytes.split_at(std::mem::size_of::<$float>());
                Complex::new(<$float>::decode(re, order), <$float>::decode(im, order))
            }

            fn encode(self, bytes: &mut [u8], order: Endian) {
                let (re, im) = bytes.split_at_mut(std::mem::size_of::<$float>());
                self.re.encode(re, order);
                self.im.encode(im, order);
            }

            fn into_value(self) -> Value {
                Value::Complex(Complex::new(self.re.into(), self.im.into()))
            }
        }
    };
}

#[cfg(feature = "num-complex")]
impl_complex_element!(f32, C64);
#[cfg(feature = "num-complex")]
impl_complex_element!(f64, C128);
