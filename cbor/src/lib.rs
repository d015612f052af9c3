#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod canonical;
pub mod decode;
pub mod encode;
pub mod error;
pub mod header;
pub mod options;
pub mod value;

#[cfg(feature = "reflect")]
pub mod reflect;

pub use decode::{Decoder, FromCbor, decode, decode_as};
pub use encode::{Encoder, ToCbor, encode, encode_as};
pub use error::{CaptureFieldErr, Error};
pub use header::{Major, Width};
pub use options::{Options, UnknownFields};
pub use value::{ByteBuf, FloatWidth, Length, Simple, Value};

#[cfg(feature = "reflect")]
pub use canopy_cbor_derive::Cbor;


#[cfg(test)]
mod encode_tests;
