//! Validation of derived state and event sets.

use std::collections::HashSet;

use syn::{Error, Ident, Path};

use crate::attrs::SetArgs;

/// A validated member of the set.
#[derive(Debug, Clone)]
pub struct Member {
    pub variant: Ident,
    pub name: String,
}

/// A validated set, members in declaration order.
#[derive(Debug)]
pub struct SetStructure {
    pub ident: Ident,
    pub krate: Path,
    pub members: Vec<Member>,
}

impl SetStructure {
    pub fn parse(args: SetArgs) -> syn::Result<Self> {
        if !args.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &args.generics,
                "state and event sets cannot be generic",
            ));
        }

        let variants = args
            .data
            .take_enum()
            .ok_or_else(|| Error::new_spanned(&args.ident, "expected an enum"))?;
        if variants.is_empty() {
            return Err(Error::new_spanned(
                &args.ident,
                "a state or event set needs at least one variant",
            ));
        }

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(variants.len());
        for variant in variants {
            let name = variant.name.unwrap_or_else(|| variant.ident.to_string());
            if name.is_empty() {
                return Err(Error::new_spanned(&variant.ident, "name must not be empty"));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::new_spanned(
                    &variant.ident,
                    format!("duplicate name \"{name}\""),
                ));
            }
            members.push(Member {
                variant: variant.ident,
                name,
            });
        }

        let krate = args
            .krate
            .unwrap_or_else(|| syn::parse_quote!(::jump_fsm));

        Ok(Self {
            ident: args.ident,
            krate,
            members,
        })
    }
}
