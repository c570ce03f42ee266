use proc_macro2::TokenStream;
use quote::quote;

use crate::internals::{ast, attr, ctxt};
use crate::{bound, Derive};

pub fn impl_derive(input: syn::DeriveInput) -> Result<TokenStream, Vec<syn::Error>> {
    let cx = ctxt::Ctxt::new();
    let container = match ast::Container::from_ast(&cx, &input, Derive::Store) {
        Some(container) => container,
        None => return Err(cx.check().unwrap_err()),
    };
    cx.check()?;

    let ident = &container.ident;
    let generics = bound::without_default(container.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let (inline, body) = match &container.data {
        ast::Data::Struct(style, fields) => {
            let inline = fields.len() < 2;
            let body = build_struct(container.attrs.tlb_tag, *style, fields);
            (inline, body)
        }
    };

    let inline = if inline { quote!(#[inline]) } else { quote!() };

    let result = quote! {
        #[automatically_derived]
        impl #impl_generics crate::cell::Store for #ident #ty_generics #where_clause {
            #inline
            fn store_into(
                &self,
                __builder: &mut crate::cell::CellBuilder,
                __context: &mut dyn crate::cell::CellContext,
            ) -> ::core::result::Result<(), crate::error::Error> {
                #body
            }
        }
    };

    Ok(result)
}

fn build_struct(
    tag: Option<attr::TlbTag>,
    style: ast::Style,
    fields: &[ast::Field<'_>],
) -> TokenStream {
    let tag = tag.map(store_tag);

    let members = fields.iter().map(|field| {
        let ident = &field.member;
        let field_ident = quote!(self.#ident);
        let op = store_op(&field_ident, field.ty);
        quote! { ok!(#op); }
    });

    match style {
        ast::Style::Unit => quote! {
            #tag
            ::core::result::Result::Ok(())
        },
        _ => quote! {
            #tag
            #(#members)*
            ::core::result::Result::Ok(())
        },
    }
}

fn store_tag(tag: attr::TlbTag) -> TokenStream {
    let bits = tag.bits as u16;
    let op = match bits {
        32 => {
            let value = tag.value;
            quote!(store_u32(#value))
        }
        1..=8 => {
            let value = tag.value as u8;
            quote!(store_small_uint(#value, #bits))
        }
        _ => {
            let value = tag.value as u64;
            quote!(store_uint(#value, #bits))
        }
    };
    quote! { ok!(__builder.#op); }
}

fn store_op(field_ident: &TokenStream, ty: &syn::Type) -> TokenStream {
    #[allow(clippy::unnecessary_operation)]
    'fallback: {
        match ty {
            syn::Type::Path(syn::TypePath { path, .. }) => {
                if let Some(syn::PathSegment { ident, arguments }) = path.segments.last() {
                    if !arguments.is_none() {
                        break 'fallback;
                    }

                    let op = match ident.to_string().as_str() {
                        "bool" => quote!(store_bit(#field_ident)),
                        "i8" => quote!(store_u8(#field_ident as u8)),
                        "u8" => quote!(store_u8(#field_ident)),
                        "i16" => quote!(store_u16(#field_ident as u16)),
                        "u16" => quote!(store_u16(#field_ident)),
                        "i32" => quote!(store_u32(#field_ident as u32)),
                        "u32" => quote!(store_u32(#field_ident)),
                        "i64" => quote!(store_u64(#field_ident as u64)),
                        "u64" => quote!(store_u64(#field_ident)),
                        "HashBytes" => quote!(store_u256(&#field_ident)),
                        "Cell" => quote!(store_reference(#field_ident.clone())),
                        _ => break 'fallback,
                    };

                    return quote!(__builder.#op);
                }
            }
            syn::Type::Reference(syn::TypeReference { elem, .. }) => {
                return store_op(field_ident, elem);
            }
            _ => break 'fallback,
        }
    };

    quote! { <#ty as crate::cell::Store>::store_into(&#field_ident, __builder, __context) }
}
