use darling::{Error, FromDeriveInput as _, ast::Style, util::Override};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, Index, Path};

use crate::args::{ContainerArgs, FieldArgs};

pub fn entry_point(input: syn::DeriveInput) -> darling::Result<TokenStream> {
    let args = ContainerArgs::from_derive_input(&input)?;

    if !args.generics.params.is_empty() {
        return Err(
            Error::custom("`Cbor` cannot be derived for generic types").with_span(&args.generics)
        );
    }

    let crate_ = args
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::canopy_cbor));

    match &args.data {
        darling::ast::Data::Enum(variants) => {
            crate::variants::emit_enum(&args.ident, variants, &crate_)
        }
        darling::ast::Data::Struct(fields) => match fields.style {
            Style::Struct => emit_record(&args, &fields.fields, &crate_),
            Style::Tuple if fields.len() == 1 => Ok(emit_newtype(&args.ident, &crate_)),
            Style::Tuple => Ok(emit_tuple(&args.ident, fields.len(), &crate_)),
            Style::Unit => Ok(emit_unit(&args.ident, &crate_)),
        },
    }
}

fn emit_record(
    args: &ContainerArgs,
    fields: &[FieldArgs],
    crate_: &Path,
) -> darling::Result<TokenStream> {
    let ty_name = &args.ident;
    let vis = &args.vis;
    let partial_name = format_ident!("__{}CborPartial", ty_name);

    let mut acc = Error::accumulator();
    let mut names = Vec::new();
    for field in fields {
        if field.skip.is_present() {
            if field.default.is_some() || field.rename.is_some() {
                acc.push(
                    Error::custom("`skip` cannot be combined with other attributes")
                        .with_span(&field.ident),
                );
            }
            continue;
        }
        if let Some(name) = field.wire_name() {
            if names.contains(&name) {
                acc.push(
                    Error::custom(format!("duplicate field name `{name}`"))
                        .with_span(&field.ident),
                );
            }
            names.push(name);
        }
    }
    acc.finish()?;

    let mapped: Vec<_> = fields
        .iter()
        .filter(|f| !f.skip.is_present())
        .filter_map(|f| Some((f.ident.as_ref()?, f)))
        .collect();

    let partial_fields = mapped.iter().map(|(ident, field)| {
        let ty = &field.ty;
        quote! { #ident: ::core::option::Option<#ty>, }
    });

    let field_entries = mapped.iter().map(|(ident, field)| {
        let name = field.wire_name();
        quote! {
            #crate_::reflect::Field::<Self> {
                name: #name,
                encode: |record: &Self, options: &#crate_::Options| {
                    #crate_::ToCbor::to_cbor(&record.#ident, options)
                },
                decode: |partial: &mut #partial_name,
                         value: #crate_::Value,
                         options: &#crate_::Options|
                 -> ::core::result::Result<(), #crate_::Error> {
                    partial.#ident = ::core::option::Option::Some(
                        #crate_::FromCbor::from_cbor(value, options)?,
                    );
                    ::core::result::Result::Ok(())
                },
            },
        }
    });

    let field_finish = fields.iter().filter_map(|field| {
        let ident = field.ident.as_ref()?;
        let ty = &field.ty;
        let name = field.wire_name();
        Some(if field.skip.is_present() {
            quote! { #ident: ::core::default::Default::default(), }
        } else {
            let absent = match &field.default {
                Some(Override::Inherit) => quote! { ::core::default::Default::default() },
                Some(Override::Explicit(path)) => quote! { #path() },
                None => quote! { <#ty as #crate_::FromCbor>::missing(#name)? },
            };
            quote! {
                #ident: match partial.#ident {
                    ::core::option::Option::Some(v) => v,
                    ::core::option::Option::None => #absent,
                },
            }
        })
    });

    Ok(quote! {
        /// Not intended for use. Implementation detail of `#[derive(Cbor)]`.
        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        #[derive(::core::default::Default)]
        #vis struct #partial_name {
            #( #partial_fields )*
        }

        #[automatically_derived]
        impl #crate_::reflect::Record for #ty_name {
            type Partial = #partial_name;

            fn field_mapping() -> #crate_::reflect::FieldMapping<Self> {
                #crate_::reflect::FieldMapping::new(::std::vec![
                    #( #field_entries )*
                ])
            }

            fn finish(partial: Self::Partial) -> ::core::result::Result<Self, #crate_::Error> {
                ::core::result::Result::Ok(Self {
                    #( #field_finish )*
                })
            }
        }

        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                options: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                #crate_::reflect::encode_record(self, options)
            }
        }

        #[automatically_derived]
        impl #crate_::FromCbor for #ty_name {
            fn from_cbor(
                value: #crate_::Value,
                options: &#crate_::Options,
            ) -> ::core::result::Result<Self, #crate_::Error> {
                #crate_::reflect::decode_record(value, options)
            }
        }
    })
}

fn emit_newtype(ty_name: &Ident, crate_: &Path) -> TokenStream {
    quote! {
        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                options: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                #crate_::ToCbor::to_cbor(&self.0, options)
            }
        }

        #[automatically_derived]
        impl #crate_::FromCbor for #ty_name {
            fn from_cbor(
                value: #crate_::Value,
                options: &#crate_::Options,
            ) -> ::core::result::Result<Self, #crate_::Error> {
                #crate_::FromCbor::from_cbor(value, options).map(Self)
            }

            fn missing(field: &'static str) -> ::core::result::Result<Self, #crate_::Error> {
                #crate_::FromCbor::missing(field).map(Self)
            }
        }
    }
}

fn emit_tuple(ty_name: &Ident, len: usize, crate_: &Path) -> TokenStream {
    let indices: Vec<_> = (0..len).map(Index::from).collect();
    let names: Vec<_> = (0..len).map(|i| i.to_string()).collect();

    quote! {
        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                options: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                use #crate_::CaptureFieldErr as _;
                ::core::result::Result::Ok(#crate_::Value::array([
                    #( #crate_::ToCbor::to_cbor(&self.#indices, options).map_field_err(#names)?, )*
                ]))
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
                if items.len() != #len {
                    return ::core::result::Result::Err(#crate_::Error::LengthMismatch {
                        declared: #len,
                        actual: items.len(),
                    });
                }
                let mut items = items.into_iter();
                ::core::result::Result::Ok(Self(
                    #(
                        #crate_::FromCbor::from_cbor(
                            items.next().ok_or(#crate_::Error::UnexpectedEof)?,
                            options,
                        )
                        .map_field_err(#names)?,
                    )*
                ))
            }
        }
    }
}

fn emit_unit(ty_name: &Ident, crate_: &Path) -> TokenStream {
    quote! {
        #[automatically_derived]
        impl #crate_::ToCbor for #ty_name {
            fn to_cbor(
                &self,
                _: &#crate_::Options,
            ) -> ::core::result::Result<#crate_::Value, #crate_::Error> {
                ::core::result::Result::Ok(#crate_::Value::null())
            }
        }

        #[automatically_derived]
        impl #crate_::FromCbor for #ty_name {
            fn from_cbor(
                value: #crate_::Value,
                _: &#crate_::Options,
            ) -> ::core::result::Result<Self, #crate_::Error> {
                if value.is_null() {
                    ::core::result::Result::Ok(Self)
                } else {
                    ::core::result::Result::Err(#crate_::Error::TypeMismatch {
                        expected: "null",
                        found: value.type_name(),
                    })
                }
            }
        }
    }
}
