//! Derive macros naming the states and events of a jump-fsm table.
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, StateSet)]
//! enum Link {
//!     Idle,
//!     Connecting,
//!     #[fsm(name = "UP")]
//!     Established,
//! }
//! ```
//!
//! Each variant maps to the index of its declaration position, and
//! `NAMES` lists the diagnostic names in the same order.

use darling::FromDeriveInput;
use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod codegen;
mod validation;

use codegen::SetKind;

/// Implements `StateSet`, `From<Self> for State` and
/// `TryFrom<State> for Self` on a fieldless enum.
#[proc_macro_derive(StateSet, attributes(fsm))]
pub fn derive_state_set(input: TokenStream) -> TokenStream {
    expand(SetKind::State, parse_macro_input!(input as DeriveInput))
}

/// Implements `EventSet`, `From<Self> for Event` and
/// `TryFrom<Event> for Self` on a fieldless enum.
#[proc_macro_derive(EventSet, attributes(fsm))]
pub fn derive_event_set(input: TokenStream) -> TokenStream {
    expand(SetKind::Event, parse_macro_input!(input as DeriveInput))
}

fn expand(kind: SetKind, input: DeriveInput) -> TokenStream {
    let args = match attrs::SetArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(e) => return e.write_errors().into(),
    };

    match validation::SetStructure::parse(args) {
        Ok(set) => codegen::generate(kind, &set).into(),
        Err(e) => e.to_compile_error().into(),
    }
}
