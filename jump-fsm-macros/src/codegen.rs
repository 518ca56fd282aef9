//! Code generation for state and event sets.

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::validation::SetStructure;

/// Which side of the table a set describes.
#[derive(Debug, Clone, Copy)]
pub enum SetKind {
    State,
    Event,
}

impl SetKind {
    fn trait_ident(self) -> proc_macro2::Ident {
        match self {
            SetKind::State => format_ident!("StateSet"),
            SetKind::Event => format_ident!("EventSet"),
        }
    }

    fn index_ident(self) -> proc_macro2::Ident {
        match self {
            SetKind::State => format_ident!("State"),
            SetKind::Event => format_ident!("Event"),
        }
    }
}

/// Generates the set trait impl and the conversions to and from the index
/// type. Variant `i` in declaration order maps to index `i`.
pub fn generate(kind: SetKind, set: &SetStructure) -> TokenStream {
    let ident = &set.ident;
    let krate = &set.krate;
    let trait_ident = kind.trait_ident();
    let index_ident = kind.index_ident();

    let variants: Vec<_> = set.members.iter().map(|m| &m.variant).collect();
    let names: Vec<_> = set.members.iter().map(|m| m.name.as_str()).collect();
    let indices: Vec<_> = (0..set.members.len()).map(Literal::usize_unsuffixed).collect();

    quote! {
        impl #krate::#trait_ident for #ident {
            const NAMES: &'static [&'static str] = &[#(#names),*];
        }

        impl ::core::convert::From<#ident> for #krate::#index_ident {
            fn from(value: #ident) -> Self {
                #krate::#index_ident::new(match value {
                    #(#ident::#variants => #indices,)*
                })
            }
        }

        impl ::core::convert::TryFrom<#krate::#index_ident> for #ident {
            type Error = #krate::#index_ident;

            fn try_from(
                value: #krate::#index_ident,
            ) -> ::core::result::Result<Self, Self::Error> {
                match value.index() {
                    #(#indices => ::core::result::Result::Ok(#ident::#variants),)*
                    _ => ::core::result::Result::Err(value),
                }
            }
        }
    }
}
