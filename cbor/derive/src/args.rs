use darling::{
    FromDeriveInput, FromField, FromVariant, ast,
    util::{Flag, Override},
};
use syn::{Generics, Ident, Path, Type, Visibility, ext::IdentExt as _};

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(cbor), supports(struct_any, enum_any))]
pub struct ContainerArgs {
    pub ident: Ident,
    pub vis: Visibility,
    pub generics: Generics,
    pub data: ast::Data<VariantArgs, FieldArgs>,
    #[darling(rename = "crate")]
    pub krate: Option<Path>,
}

#[derive(Debug, FromField)]
#[darling(attributes(cbor))]
pub struct FieldArgs {
    pub ident: Option<Ident>,
    pub ty: Type,
    pub rename: Option<String>,
    pub default: Option<Override<Path>>,
    pub skip: Flag,
}

impl FieldArgs {
    /// The key this field is stored under.
    pub fn wire_name(&self) -> Option<String> {
        self.rename
            .clone()
            .or_else(|| self.ident.as_ref().map(|i| i.unraw().to_string()))
    }
}

#[derive(Debug, FromVariant)]
#[darling(attributes(cbor))]
pub struct VariantArgs {
    pub ident: Ident,
    pub fields: ast::Fields<FieldArgs>,
    pub id: Option<u64>,
}
