//! Representation codes used by explicitly formatted logical records
//!
//! RP66 v1 defines 27 representation codes. All of them can appear in
//! attribute values, so all of them decode here into [`Value`].

use binrw::BinReaderExt;
use binrw::io::Cursor;
use serde::Serialize;
use std::fmt;

use crate::error::{FormatError, FormatResult};
use crate::object::ObjectName;

/// Low precision floating point
pub const FSHORT: u8 = 1;
/// IEEE single precision floating point
pub const FSINGL: u8 = 2;
/// Validated single precision floating point
pub const FSING1: u8 = 3;
/// Two-way validated single precision floating point
pub const FSING2: u8 = 4;
/// IBM single precision floating point
pub const ISINGL: u8 = 5;
/// VAX single precision floating point
pub const VSINGL: u8 = 6;
/// IEEE double precision floating point
pub const FDOUBL: u8 = 7;
/// Validated double precision floating point
pub const FDOUB1: u8 = 8;
/// Two-way validated double precision floating point
pub const FDOUB2: u8 = 9;
/// Single precision complex
pub const CSINGL: u8 = 10;
/// Double precision complex
pub const CDOUBL: u8 = 11;
/// Short signed integer
pub const SSHORT: u8 = 12;
/// Normal signed integer
pub const SNORM: u8 = 13;
/// Long signed integer
pub const SLONG: u8 = 14;
/// Short unsigned integer
pub const USHORT: u8 = 15;
/// Normal unsigned integer
pub const UNORM: u8 = 16;
/// Long unsigned integer
pub const ULONG: u8 = 17;
/// Variable-length unsigned integer
pub const UVARI: u8 = 18;
/// Variable-length identifier
pub const IDENT: u8 = 19;
/// Variable-length ASCII character string
pub const ASCII: u8 = 20;
/// Date and time
pub const DTIME: u8 = 21;
/// Origin reference
pub const ORIGIN: u8 = 22;
/// Object name
pub const OBNAME: u8 = 23;
/// Object reference
pub const OBJREF: u8 = 24;
/// Attribute reference
pub const ATTREF: u8 = 25;
/// Boolean status
pub const STATUS: u8 = 26;
/// Units expression
pub const UNITS: u8 = 27;

/// Date and time (DTIME)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateTime {
    /// Year
    pub year: u16,
    /// Time zone: 0 local standard, 1 local daylight savings, 2 GMT
    pub time_zone: u8,
    /// Month (1-12)
    pub month: u8,
    /// Day of month
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute
    pub minute: u8,
    /// Second
    pub second: u8,
    /// Millisecond
    pub millisecond: u16,
}

/// Decoded attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Any integer code
    Int(i64),
    /// Any plain floating point code
    Float(f64),
    /// Validated floating point: value plus one or two bounds
    Validated {
        /// Nominal value
        value: f64,
        /// Bounds (one for FSING1/FDOUB1, two for FSING2/FDOUB2)
        bounds: Vec<f64>,
    },
    /// Complex number
    Complex {
        /// Real part
        re: f64,
        /// Imaginary part
        im: f64,
    },
    /// IDENT, ASCII or UNITS
    Text(String),
    /// DTIME
    Time(DateTime),
    /// OBNAME
    Name(ObjectName),
    /// OBJREF
    Reference {
        /// Referenced object type
        object_type: String,
        /// Referenced object name
        name: ObjectName,
    },
    /// ATTREF
    AttributeReference {
        /// Referenced object type
        object_type: String,
        /// Referenced object name
        name: ObjectName,
        /// Referenced attribute label
        label: String,
    },
    /// STATUS
    Status(bool),
}

impl Value {
    /// Text content of IDENT/ASCII/UNITS values
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Validated { value, bounds } => {
                write!(f, "{value}")?;
                for bound in bounds {
                    write!(f, " +/-{bound}")?;
                }
                Ok(())
            }
            Self::Complex { re, im } => write!(f, "{re}{im:+}i"),
            Self::Text(s) => f.write_str(s),
            Self::Time(t) => write!(f, "{t}"),
            Self::Name(name) => write!(f, "{}.{}.{}", name.origin, name.copy, name.id),
            Self::Reference { object_type, name } => {
                write!(f, "{object_type}({}.{}.{})", name.origin, name.copy, name.id)
            }
            Self::AttributeReference {
                object_type,
                name,
                label,
            } => write!(
                f,
                "{object_type}({}.{}.{}):{label}",
                name.origin, name.copy, name.id
            ),
            Self::Status(v) => write!(f, "{v}"),
        }
    }
}

/// Cursor over a record body with RP66 primitive readers
pub struct BodyReader<'a> {
    cursor: Cursor<&'a [u8]>,
    len: usize,
}

impl<'a> BodyReader<'a> {
    /// Create a reader over a record body
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            len: data.len(),
        }
    }

    /// Current position in the body
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.position())
    }

    /// Whether the body is exhausted
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Next byte without consuming it
    pub fn peek(&self) -> Option<u8> {
        self.cursor.get_ref().get(self.position()).copied()
    }

    fn need(&self, needed: usize) -> FormatResult<()> {
        if self.remaining() < needed {
            return Err(FormatError::Truncated {
                needed,
                position: self.position(),
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn bytes(&mut self, n: usize) -> FormatResult<&'a [u8]> {
        self.need(n)?;
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + n) as u64);
        Ok(&data[start..start + n])
    }

    /// USHORT
    pub fn ushort(&mut self) -> FormatResult<u8> {
        self.need(1)?;
        Ok(self.cursor.read_be::<u8>()?)
    }

    /// UNORM
    pub fn unorm(&mut self) -> FormatResult<u16> {
        self.need(2)?;
        Ok(self.cursor.read_be::<u16>()?)
    }

    /// ULONG
    pub fn ulong(&mut self) -> FormatResult<u32> {
        self.need(4)?;
        Ok(self.cursor.read_be::<u32>()?)
    }

    /// SSHORT
    pub fn sshort(&mut self) -> FormatResult<i8> {
        self.need(1)?;
        Ok(self.cursor.read_be::<i8>()?)
    }

    /// SNORM
    pub fn snorm(&mut self) -> FormatResult<i16> {
        self.need(2)?;
        Ok(self.cursor.read_be::<i16>()?)
    }

    /// SLONG
    pub fn slong(&mut self) -> FormatResult<i32> {
        self.need(4)?;
        Ok(self.cursor.read_be::<i32>()?)
    }

    /// FSINGL
    pub fn fsingl(&mut self) -> FormatResult<f32> {
        self.need(4)?;
        Ok(self.cursor.read_be::<f32>()?)
    }

    /// FDOUBL
    pub fn fdoubl(&mut self) -> FormatResult<f64> {
        self.need(8)?;
        Ok(self.cursor.read_be::<f64>()?)
    }

    /// UVARI: 1, 2 or 4 bytes depending on the two high bits
    pub fn uvari(&mut self) -> FormatResult<u32> {
        let first = self.peek().ok_or(FormatError::Truncated {
            needed: 1,
            position: self.position(),
            available: 0,
        })?;
        match first >> 6 {
            0b00 | 0b01 => Ok(u32::from(self.ushort()?)),
            0b10 => Ok(u32::from(self.unorm()? & 0x3FFF)),
            _ => Ok(self.ulong()? & 0x3FFF_FFFF),
        }
    }

    /// IDENT
    pub fn ident(&mut self) -> FormatResult<String> {
        let len = usize::from(self.ushort()?);
        Ok(String::from_utf8_lossy(self.bytes(len)?).into_owned())
    }

    /// ASCII
    pub fn ascii(&mut self) -> FormatResult<String> {
        let len = self.uvari()? as usize;
        Ok(String::from_utf8_lossy(self.bytes(len)?).into_owned())
    }

    /// OBNAME
    pub fn obname(&mut self) -> FormatResult<ObjectName> {
        let origin = self.uvari()?;
        let copy = self.ushort()?;
        let id = self.ident()?;
        Ok(ObjectName { origin, copy, id })
    }

    /// DTIME
    pub fn dtime(&mut self) -> FormatResult<DateTime> {
        let year = u16::from(self.ushort()?) + 1900;
        let tz_month = self.ushort()?;
        let day = self.ushort()?;
        let hour = self.ushort()?;
        let minute = self.ushort()?;
        let second = self.ushort()?;
        let millisecond = self.unorm()?;
        Ok(DateTime {
            year,
            time_zone: tz_month >> 4,
            month: tz_month & 0x0F,
            day,
            hour,
            minute,
            second,
            millisecond,
        })
    }

    /// Decode one value of the given representation code
    pub fn value(&mut self, reprc: u8) -> FormatResult<Value> {
        let value = match reprc {
            FSHORT => Value::Float(fshort(self.unorm()?)),
            FSINGL => Value::Float(f64::from(self.fsingl()?)),
            FSING1 => {
                let value = f64::from(self.fsingl()?);
                let bound = f64::from(self.fsingl()?);
                Value::Validated {
                    value,
                    bounds: vec![bound],
                }
            }
            FSING2 => {
                let value = f64::from(self.fsingl()?);
                let a = f64::from(self.fsingl()?);
                let b = f64::from(self.fsingl()?);
                Value::Validated {
                    value,
                    bounds: vec![a, b],
                }
            }
            ISINGL => Value::Float(ibm_single(self.ulong()?)),
            VSINGL => {
                let raw = self.bytes(4)?;
                Value::Float(vax_single([raw[0], raw[1], raw[2], raw[3]]))
            }
            FDOUBL => Value::Float(self.fdoubl()?),
            FDOUB1 => {
                let value = self.fdoubl()?;
                let bound = self.fdoubl()?;
                Value::Validated {
                    value,
                    bounds: vec![bound],
                }
            }
            FDOUB2 => {
                let value = self.fdoubl()?;
                let a = self.fdoubl()?;
                let b = self.fdoubl()?;
                Value::Validated {
                    value,
                    bounds: vec![a, b],
                }
            }
            CSINGL => {
                let re = f64::from(self.fsingl()?);
                let im = f64::from(self.fsingl()?);
                Value::Complex { re, im }
            }
            CDOUBL => {
                let re = self.fdoubl()?;
                let im = self.fdoubl()?;
                Value::Complex { re, im }
            }
            SSHORT => Value::Int(i64::from(self.sshort()?)),
            SNORM => Value::Int(i64::from(self.snorm()?)),
            SLONG => Value::Int(i64::from(self.slong()?)),
            USHORT => Value::Int(i64::from(self.ushort()?)),
            UNORM => Value::Int(i64::from(self.unorm()?)),
            ULONG => Value::Int(i64::from(self.ulong()?)),
            UVARI | ORIGIN => Value::Int(i64::from(self.uvari()?)),
            IDENT | UNITS => Value::Text(self.ident()?),
            ASCII => Value::Text(self.ascii()?),
            DTIME => Value::Time(self.dtime()?),
            OBNAME => Value::Name(self.obname()?),
            OBJREF => {
                let object_type = self.ident()?;
                let name = self.obname()?;
                Value::Reference { object_type, name }
            }
            ATTREF => {
                let object_type = self.ident()?;
                let name = self.obname()?;
                let label = self.ident()?;
                Value::AttributeReference {
                    object_type,
                    name,
                    label,
                }
            }
            STATUS => Value::Status(self.ushort()? != 0),
            other => return Err(FormatError::UnknownRepresentationCode(other)),
        };
        Ok(value)
    }

    /// Decode `count` values of the given representation code
    pub fn values(&mut self, reprc: u8, count: u32) -> FormatResult<Vec<Value>> {
        (0..count).map(|_| self.value(reprc)).collect()
    }
}

/// FSHORT: 12-bit two's complement fraction and 4-bit exponent
fn fshort(raw: u16) -> f64 {
    // Arithmetic shift keeps the sign of the 12-bit fraction
    let fraction = f64::from((raw as i16) >> 4) / 2048.0;
    let exponent = i32::from(raw & 0x000F);
    fraction * 2f64.powi(exponent)
}

/// IBM System/360 single precision: base 16, excess-64 exponent
fn ibm_single(raw: u32) -> f64 {
    let sign = if raw & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
    let exponent = ((raw >> 24) & 0x7F) as i32 - 64;
    let fraction = f64::from(raw & 0x00FF_FFFF) / f64::from(1u32 << 24);
    sign * fraction * 16f64.powi(exponent)
}

/// VAX F-floating: 16-bit words swapped, excess-128 exponent, hidden bit
fn vax_single(b: [u8; 4]) -> f64 {
    let raw = u32::from_be_bytes([b[1], b[0], b[3], b[2]]);
    let exponent = ((raw >> 23) & 0xFF) as i32;
    if exponent == 0 {
        return 0.0;
    }
    let sign = if raw & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
    let fraction = 0.5 + f64::from(raw & 0x007F_FFFF) / f64::from(1u32 << 24);
    sign * fraction * 2f64.powi(exponent - 128)
}
