use proc_macro::TokenStream;
use quote::quote;

mod bound;
mod derive_load;
mod derive_store;
mod internals;

#[derive(Copy, Clone, Eq, PartialEq)]
enum Derive {
    Store,
    Load,
}

/// Implements `Store` for the type.
///
/// Fields are stored in declaration order. An optional container tag is
/// written before the first field: `#[tlb(tag = "#946a98b6")]` (hex) or
/// `#[tlb(tag = "$01")]` (binary).
#[proc_macro_derive(Store, attributes(tlb))]
pub fn derive_store(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    derive_store::impl_derive(input)
        .unwrap_or_else(to_compile_errors)
        .into()
}

/// Implements `Load` for the type.
///
/// A container tag is checked before the fields are read. A mismatch
/// fails with `Error::InvalidTag`.
#[proc_macro_derive(Load, attributes(tlb))]
pub fn derive_load(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    derive_load::impl_derive(input)
        .unwrap_or_else(to_compile_errors)
        .into()
}

fn to_compile_errors(errors: Vec<syn::Error>) -> proc_macro2::TokenStream {
    let compile_errors = errors.iter().map(syn::Error::to_compile_error);
    quote!(#(#compile_errors)*)
}
