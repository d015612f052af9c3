/*!
Item headers: the initial byte (3-bit major type, 5-bit additional
information) and the optional 1, 2, 4 or 8 byte argument that follows it.
*/

use alloc::vec::Vec;
use thiserror::Error;

/// Initial byte of the "break" stop code that closes indefinite-length items.
pub const BREAK: u8 = 0xFF;

const INDEFINITE: u8 = 31;

/// The major type of a CBOR data item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Major {
    Unsigned = 0,
    Negative = 1,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Simple = 7,
}

impl Major {
    pub fn from_initial(initial: u8) -> Self {
        match initial >> 5 {
            0 => Self::Unsigned,
            1 => Self::Negative,
            2 => Self::Bytes,
            3 => Self::Text,
            4 => Self::Array,
            5 => Self::Map,
            6 => Self::Tag,
            _ => Self::Simple,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned integer",
            Self::Negative => "negative integer",
            Self::Bytes => "byte string",
            Self::Text => "text string",
            Self::Array => "array",
            Self::Map => "map",
            Self::Tag => "tag",
            Self::Simple => "simple value",
        }
    }
}

impl core::fmt::Display for Major {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// How many bytes an argument occupies after the initial byte.
///
/// `Shortest` is the absence of a preference: writers pick the smallest
/// width that holds the argument. Headers read from the wire always carry
/// one of the concrete widths.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    #[default]
    Shortest,
    Immediate,
    One,
    Two,
    Four,
    Eight,
}

impl Width {
    /// The smallest concrete width able to carry `argument`.
    pub fn shortest_for(argument: u64) -> Self {
        if argument < 24 {
            Self::Immediate
        } else if argument <= u8::MAX as u64 {
            Self::One
        } else if argument <= u16::MAX as u64 {
            Self::Two
        } else if argument <= u32::MAX as u64 {
            Self::Four
        } else {
            Self::Eight
        }
    }

    pub fn fits(self, argument: u64) -> bool {
        match self {
            Self::Shortest | Self::Eight => true,
            Self::Immediate => argument < 24,
            Self::One => argument <= u8::MAX as u64,
            Self::Two => argument <= u16::MAX as u64,
            Self::Four => argument <= u32::MAX as u64,
        }
    }

    /// Number of argument bytes following the initial byte.
    pub fn extra_bytes(self) -> usize {
        match self {
            Self::Shortest | Self::Immediate => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Resolve `Shortest` (or a width too narrow for `argument`) to a
    /// concrete width.
    pub fn resolve(self, argument: u64) -> Self {
        if self == Self::Shortest || !self.fits(argument) {
            Self::shortest_for(argument)
        } else {
            self
        }
    }

    fn from_info(info: u8) -> Option<Self> {
        match info {
            0..=23 => Some(Self::Immediate),
            24 => Some(Self::One),
            25 => Some(Self::Two),
            26 => Some(Self::Four),
            27 => Some(Self::Eight),
            _ => None,
        }
    }
}

/// The argument carried by a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    Value(u64, Width),
    /// Additional information 31: indefinite length, or "break" for major type 7.
    Indefinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major: Major,
    pub argument: Argument,
}

impl Header {
    pub fn new(major: Major, argument: u64) -> Self {
        Self {
            major,
            argument: Argument::Value(argument, Width::shortest_for(argument)),
        }
    }

    pub fn is_break(&self) -> bool {
        self.major == Major::Simple && self.argument == Argument::Indefinite
    }

    /// Whether the argument uses the smallest possible width.
    ///
    /// Not meaningful for floating-point headers, whose width is the payload
    /// size rather than an integer encoding.
    pub fn is_shortest(&self) -> bool {
        match self.argument {
            Argument::Value(v, w) => w == Width::shortest_for(v),
            Argument::Indefinite => false,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFault {
    #[error("reserved additional information value {0}")]
    Reserved(u8),

    #[error("header truncated")]
    Truncated,

    #[error("indefinite length is not allowed for {0}")]
    IndefiniteNotAllowed(Major),
}

fn initial(major: Major, info: u8) -> u8 {
    ((major as u8) << 5) | info
}

/// Append the shortest header for `argument`.
pub fn write_header(buf: &mut Vec<u8>, major: Major, argument: u64) {
    write_header_with(buf, major, argument, Width::Shortest)
}

/// Append a header using `width` for the argument, unless the argument does
/// not fit, in which case the shortest width is used.
pub fn write_header_with(buf: &mut Vec<u8>, major: Major, argument: u64, width: Width) {
    match width.resolve(argument) {
        Width::Shortest | Width::Immediate => buf.push(initial(major, argument as u8)),
        Width::One => {
            buf.push(initial(major, 24));
            buf.push(argument as u8)
        }
        Width::Two => {
            buf.push(initial(major, 25));
            buf.extend((argument as u16).to_be_bytes())
        }
        Width::Four => {
            buf.push(initial(major, 26));
            buf.extend((argument as u32).to_be_bytes())
        }
        Width::Eight => {
            buf.push(initial(major, 27));
            buf.extend(argument.to_be_bytes())
        }
    }
}

/// Append the indefinite-length header for `major`.
pub fn write_indefinite(buf: &mut Vec<u8>, major: Major) {
    buf.push(initial(major, INDEFINITE))
}

/// Serialize a single shortest-form header.
pub fn header_bytes(major: Major, argument: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    write_header(&mut buf, major, argument);
    buf
}

fn parse_uint_minor(info: u8, data: &[u8]) -> Result<(u64, usize), HeaderFault> {
    let Some(width) = Width::from_info(info) else {
        return Err(HeaderFault::Reserved(info));
    };
    let len = width.extra_bytes();
    let bytes = data.get(..len).ok_or(HeaderFault::Truncated)?;
    let v = match width {
        Width::Immediate => info as u64,
        _ => bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64),
    };
    Ok((v, len))
}

/// Read one header from the start of `data`, returning it together with the
/// number of bytes it occupies.
pub fn read_header(data: &[u8]) -> Result<(Header, usize), HeaderFault> {
    let Some(&first) = data.first() else {
        return Err(HeaderFault::Truncated);
    };
    let major = Major::from_initial(first);
    let info = first & 0x1F;

    if info == INDEFINITE {
        return match major {
            Major::Unsigned | Major::Negative | Major::Tag => {
                Err(HeaderFault::IndefiniteNotAllowed(major))
            }
            _ => Ok((
                Header {
                    major,
                    argument: Argument::Indefinite,
                },
                1,
            )),
        };
    }

    let (v, len) = parse_uint_minor(info, &data[1..])?;
    let width = Width::from_info(info).unwrap_or_default();
    Ok((
        Header {
            major,
            argument: Argument::Value(v, width),
        },
        len + 1,
    ))
}
