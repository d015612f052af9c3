use proc_macro::TokenStream as StdTokenStream;
use syn::DeriveInput;

mod args;
mod derive_cbor;
mod variants;

/// Derives `ToCbor` and `FromCbor`.
///
/// ### Structs with named fields
///
/// Implements `reflect::Record`, encoding the struct as a map keyed by field
/// name (or an array in declaration order when `positional_records` is set).
/// A hidden `__<name>CborPartial` struct collects fields during decoding.
///
/// Field attributes:
/// - `#[cbor(rename = "name")]`: the key used on the wire.
/// - `#[cbor(default)]`: use `Default::default()` when the field is absent.
/// - `#[cbor(default = "path")]`: call `path()` when the field is absent.
/// - `#[cbor(skip)]`: never encoded or decoded, always `Default::default()`.
///
/// ### Other structs
///
/// Newtypes are transparent, tuple structs are arrays and unit structs are
/// `null`.
///
/// ### Enums
///
/// Unit-only enums are encoded as their integer discriminant. Enums whose
/// variants each wrap a single value and carry `#[cbor(id = N)]` are encoded
/// as the array `[N, value]`.
///
/// The container attribute `#[cbor(crate = "path")]` overrides the path to
/// `canopy_cbor` used by the expansion.
#[proc_macro_derive(Cbor, attributes(cbor))]
pub fn derive_cbor(input: StdTokenStream) -> StdTokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    derive_cbor::entry_point(input)
        .unwrap_or_else(|e| e.write_errors())
        .into()
}
