use syn::punctuated::Punctuated;
use syn::Token;

use super::attr;
use super::ctxt::*;
use crate::Derive;

pub struct Container<'a> {
    pub ident: syn::Ident,
    pub attrs: attr::Container,
    pub data: Data<'a>,
    pub generics: &'a syn::Generics,
}

impl<'a> Container<'a> {
    pub(crate) fn from_ast(cx: &Ctxt, item: &'a syn::DeriveInput, derive: Derive) -> Option<Self> {
        let attrs = attr::Container::from_ast(cx, item);

        let data = match &item.data {
            syn::Data::Struct(data) => {
                let (style, fields) = struct_from_ast(cx, &data.fields);
                Data::Struct(style, fields)
            }
            syn::Data::Enum(_) => {
                let name = match derive {
                    Derive::Store => "Store",
                    Derive::Load => "Load",
                };
                cx.error_spanned_by(
                    item,
                    format!("`{name}` can only be derived for structs, implement it manually"),
                );
                return None;
            }
            syn::Data::Union(_) => {
                cx.error_spanned_by(item, "tlb doesn't support derive for unions");
                return None;
            }
        };

        Some(Self {
            ident: item.ident.clone(),
            attrs,
            data,
            generics: &item.generics,
        })
    }
}

fn struct_from_ast<'a>(cx: &Ctxt, fields: &'a syn::Fields) -> (Style, Vec<Field<'a>>) {
    match fields {
        syn::Fields::Named(fields) => (Style::Struct, fields_from_ast(cx, &fields.named)),
        syn::Fields::Unnamed(fields) => (Style::Tuple, fields_from_ast(cx, &fields.unnamed)),
        syn::Fields::Unit => (Style::Unit, Vec::new()),
    }
}

fn fields_from_ast<'a>(cx: &Ctxt, fields: &'a Punctuated<syn::Field, Token![,]>) -> Vec<Field<'a>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            attr::check_field_attrs(cx, field);
            Field {
                member: match &field.ident {
                    Some(ident) => syn::Member::Named(ident.clone()),
                    None => syn::Member::Unnamed(i.into()),
                },
                ty: &field.ty,
            }
        })
        .collect()
}

pub enum Data<'a> {
    Struct(Style, Vec<Field<'a>>),
}

pub struct Field<'a> {
    pub member: syn::Member,
    pub ty: &'a syn::Type,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Style {
    Struct,
    Tuple,
    Unit,
}
