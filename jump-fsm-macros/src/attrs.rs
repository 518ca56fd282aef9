//! Attribute parsing for the set derives.

use darling::{FromDeriveInput, FromVariant};
use syn::{Generics, Ident, Path};

/// Container arguments: `#[fsm(crate = "path::to::jump_fsm")]`.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(fsm), supports(enum_unit))]
pub struct SetArgs {
    pub ident: Ident,
    pub generics: Generics,
    pub data: darling::ast::Data<VariantArgs, ()>,

    /// Path to the jump-fsm crate (default: `::jump_fsm`).
    #[darling(default, rename = "crate")]
    pub krate: Option<Path>,
}

/// Variant arguments: `#[fsm(name = "T1")]`.
#[derive(Debug, FromVariant)]
#[darling(attributes(fsm))]
pub struct VariantArgs {
    pub ident: Ident,

    /// Diagnostic name (default: the variant identifier).
    #[darling(default)]
    pub name: Option<String>,
}
