use proc_macro2::TokenStream;
use quote::quote;

use crate::internals::{ast, attr, ctxt};
use crate::{bound, Derive};

pub fn impl_derive(input: syn::DeriveInput) -> Result<TokenStream, Vec<syn::Error>> {
    let cx = ctxt::Ctxt::new();
    let container = match ast::Container::from_ast(&cx, &input, Derive::Load) {
        Some(container) => container,
        None => return Err(cx.check().unwrap_err()),
    };
    cx.check()?;

    let tlb_lifetime: syn::LifetimeParam = syn::parse_quote!('tlb);

    let ident = &container.ident;
    let generics = bound::without_default(container.generics);
    let (_, ty_generics, where_clause) = generics.split_for_impl();

    let mut alt_generics = generics.clone();

    let has_tlb_lifetime = alt_generics.params.iter().any(|param| match param {
        syn::GenericParam::Lifetime(def) => def.lifetime == tlb_lifetime.lifetime,
        _ => false,
    });
    if !has_tlb_lifetime {
        alt_generics
            .params
            .insert(0, syn::GenericParam::Lifetime(tlb_lifetime.clone()));
    }
    let (impl_generics, _, _) = alt_generics.split_for_impl();

    let (inline, body) = match &container.data {
        ast::Data::Struct(style, fields) => {
            let inline = fields.len() < 2;
            let body = build_struct(&tlb_lifetime, container.attrs.tlb_tag, *style, fields);
            (inline, body)
        }
    };

    let inline = if inline { quote!(#[inline]) } else { quote!() };

    let lifetime = &tlb_lifetime.lifetime;
    let result = quote! {
        #[automatically_derived]
        impl #impl_generics crate::cell::Load<#lifetime> for #ident #ty_generics #where_clause {
            #inline
            fn load_from(
                __slice: &mut crate::cell::CellSlice<#lifetime>
            ) -> ::core::result::Result<Self, crate::error::Error> {
                #body
            }
        }
    };

    Ok(result)
}

fn build_struct(
    lifetime_def: &syn::LifetimeParam,
    tag: Option<attr::TlbTag>,
    style: ast::Style,
    fields: &[ast::Field<'_>],
) -> TokenStream {
    let tag = tag.map(load_tag);

    let members = fields.iter().map(|field| {
        let ident = &field.member;
        let op = load_op(lifetime_def, field.ty);
        quote! {
            #ident: ok!(#op)
        }
    });

    match style {
        ast::Style::Unit => quote! {
            #tag
            ::core::result::Result::Ok(Self)
        },
        _ => quote! {
            #tag
            ::core::result::Result::Ok(Self {
                #(#members,)*
            })
        },
    }
}

fn load_tag(tag: attr::TlbTag) -> TokenStream {
    let bits = tag.bits as u16;
    let (op, value) = match bits {
        32 => {
            let value = tag.value;
            (quote!(load_u32()), quote!(#value))
        }
        1..=8 => {
            let value = tag.value as u8;
            (quote!(load_small_uint(#bits)), quote!(#value))
        }
        _ => {
            let value = tag.value as u64;
            (quote!(load_uint(#bits)), quote!(#value))
        }
    };

    quote! {
        match __slice.#op {
            ::core::result::Result::Ok(#value) => {}
            ::core::result::Result::Ok(_) => {
                return ::core::result::Result::Err(crate::error::Error::InvalidTag)
            }
            ::core::result::Result::Err(e) => return ::core::result::Result::Err(e),
        }
    }
}

fn load_op(lifetime_def: &syn::LifetimeParam, ty: &syn::Type) -> TokenStream {
    #[allow(clippy::unnecessary_operation)]
    'fallback: {
        if let syn::Type::Path(syn::TypePath { path, .. }) = ty {
            if let Some(syn::PathSegment { ident, arguments }) = path.segments.last() {
                if !arguments.is_none() {
                    break 'fallback;
                }

                let op = match ident.to_string().as_str() {
                    "bool" => quote!(load_bit()),
                    "i8" => return quote!(__slice.load_u8().map(|x| x as i8)),
                    "u8" => quote!(load_u8()),
                    "i16" => return quote!(__slice.load_u16().map(|x| x as i16)),
                    "u16" => quote!(load_u16()),
                    "i32" => return quote!(__slice.load_u32().map(|x| x as i32)),
                    "u32" => quote!(load_u32()),
                    "i64" => return quote!(__slice.load_u64().map(|x| x as i64)),
                    "u64" => quote!(load_u64()),
                    "HashBytes" => quote!(load_u256()),
                    "Cell" => quote!(load_reference_cloned()),
                    _ => break 'fallback,
                };

                return quote!(__slice.#op);
            }
        }
    };

    let lifetime = &lifetime_def.lifetime;
    quote! { <#ty as crate::cell::Load<#lifetime>>::load_from(__slice) }
}
