use darling::{Error, ast::Style};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Path};

use crate::args::VariantArgs;

pub fn emit_enum(
    ty_name: &Ident,
    variants: &[VariantArgs],
    crate_: &Path,
) -> darling::Result<TokenStream> {
    if variants.is_empty() {
        return Err(Error::custom("`Cbor` cannot be derived for enums without variants")
            .with_span(ty_name));
    }

    if variants
        .iter()
        .all(|v| v.fields.style == Style::Unit && v.id.is_none())
    {
        return Ok(emit_discriminants(ty_name, variants, crate_));
    }

    let mut acc = Error::accumulator();
    let mut ids = Vec::new();
    for variant in variants {
        match variant.id {
            Some(id) if ids.contains(&id) => {
                acc.push(Error::custom(format!("duplicate id {id}")).with_span(&variant.ident))
            }
            Some(id) => ids.push(id),
            None => acc.push(
                Error::custom("every variant needs `#[cbor(id = N)]` unless all are unit variants")
                    .with_span(&variant.ident),
            ),
        }
        if variant.fields.style != Style::Tuple || variant.fields.len() != 1 {
            acc.push(
                Error::custom("identified variants must wrap exactly one unnamed value")
                    .with_span(&variant.ident),
            );
        }
    }
    acc.finish()?;

    Ok(emit_identified(ty_name, variants, crate_))
}

fn emit_discriminants(ty_name: &Ident, variants: &[VariantArgs], crate_: &Path) -> TokenStream {
    let idents: Vec<_> = variants.iter().map(|v| &v.ident).collect();

    quote! {
        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                _: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                let discriminant = match self {
                    #( Self::#idents => Self::#idents as i128, )*
                };
                ::core::result::Result::Ok(#crate_::Value::from(discriminant))
            }
        }

        #[automatically_derived]
        impl #crate_::FromCbor for #ty_name {
            fn from_cbor(
                value: #crate_::Value,
                _: &#crate_::Options,
            ) -> ::core::result::Result<Self, #crate_::Error> {
                let ::core::option::Option::Some(discriminant) = value.as_i128() else {
                    return ::core::result::Result::Err(#crate_::Error::TypeMismatch {
                        expected: "integer",
                        found: value.type_name(),
                    });
                };
                #(
                    if discriminant == Self::#idents as i128 {
                        return ::core::result::Result::Ok(Self::#idents);
                    }
                )*
                ::core::result::Result::Err(#crate_::Error::UnknownVariant(discriminant))
            }
        }
    }
}

fn emit_identified(ty_name: &Ident, variants: &[VariantArgs], crate_: &Path) -> TokenStream {
    let idents: Vec<_> = variants.iter().map(|v| &v.ident).collect();
    let names: Vec<_> = idents.iter().map(|i| i.to_string()).collect();
    let ids: Vec<_> = variants.iter().filter_map(|v| v.id).collect();

    quote! {
        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                options: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                use #crate_::CaptureFieldErr as _;
                let (id, value) = match self {
                    #(
                        Self::#idents(v) => (
                            #ids,
                            #crate_::ToCbor::to_cbor(v, options).map_field_err(#names)?,
                        ),
                    )*
                };
                ::core::result::Result::Ok(#crate_::Value::array([#crate_::Value::uint(id), value]))
            }
        }

        #[automatically_derived]
        impl #crate_::FromCbor for #ty_name {
            fn from_cbor(
                value: #crate_::Value,
                options: &#crate_::Options,
            ) -> ::core::result::Result<Self, #crate_::Error> {
                use #crate_::CaptureFieldErr as _;
                let items = match value {
                    #crate_::Value::Array(items, _) => items,
                    v => {
                        return ::core::result::Result::Err(#crate_::Error::TypeMismatch {
                            expected: "array",
                            found: v.type_name(),
                        });
                    }
                };
                let [id, value]: [#crate_::Value; 2] = items.try_into().map_err(
                    |items: ::std::vec::Vec<#crate_::Value>| #crate_::Error::LengthMismatch {
                        declared: 2,
                        actual: items.len(),
                    },
                )?;
                let ::core::option::Option::Some(id) = id.as_u64() else {
                    return ::core::result::Result::Err(#crate_::Error::TypeMismatch {
                        expected: "unsigned integer",
                        found: id.type_name(),
                    });
                };
                match id {
                    #(
                        #ids => #crate_::FromCbor::from_cbor(value, options)
                            .map(Self::#idents)
                            .map_field_err(#names),
                    )*
                    id => ::core::result::Result::Err(#crate_::Error::UnknownVariant(id as i128)),
                }
            }
        }
    }
}
