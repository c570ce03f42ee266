use proc_macro2::TokenStream;
use quote::ToTokens;
use syn::meta::ParseNestedMeta;

use super::ctxt::*;
use super::symbol::*;

pub struct Container {
    pub tlb_tag: Option<TlbTag>,
}

impl Container {
    pub fn from_ast(cx: &Ctxt, item: &syn::DeriveInput) -> Self {
        let mut tlb_tag = Attr::none(cx, TAG);

        for attr in &item.attrs {
            if attr.path() != TLB {
                continue;
            }

            if let syn::Meta::List(meta) = &attr.meta {
                if meta.tokens.is_empty() {
                    continue;
                }
            }

            if let Err(e) = attr.parse_nested_meta(|meta| {
                if meta.path == TAG {
                    // Parse `#[tlb(tag = "#ab")]`
                    if let Some(value) = parse_lit_into_tlb_tag(cx, TAG, &meta)? {
                        tlb_tag.set(&meta.path, value);
                    }
                } else {
                    let path = meta.path.to_token_stream().to_string().replace(' ', "");
                    return Err(
                        meta.error(format_args!("unknown TLB container attribute `{}`", path))
                    );
                }
                Ok(())
            }) {
                cx.syn_error(e);
            }
        }

        Self {
            tlb_tag: tlb_tag.get(),
        }
    }
}

pub fn check_field_attrs(cx: &Ctxt, field: &syn::Field) {
    for attr in &field.attrs {
        if attr.path() != TLB {
            continue;
        }

        if let syn::Meta::List(meta) = &attr.meta {
            if meta.tokens.is_empty() {
                continue;
            }
        }

        if let Err(e) = attr.parse_nested_meta(|meta| {
            let path = meta.path.to_token_stream().to_string().replace(' ', "");
            Err(meta.error(format_args!("unknown TLB field attribute `{}`", path)))
        }) {
            cx.syn_error(e);
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TlbTag {
    pub value: u32,
    pub bits: u8,
}

fn parse_lit_into_tlb_tag(
    cx: &Ctxt,
    attr_name: Symbol,
    meta: &ParseNestedMeta,
) -> syn::Result<Option<TlbTag>> {
    let Some(lit) = get_lit_str(cx, attr_name, meta)? else {
        return Ok(None);
    };
    let string = lit.value();
    let string = string.trim();
    if let Some(hex_tag) = string.strip_prefix('#') {
        if !hex_tag.is_empty() && hex_tag.len() <= 8 {
            if let Ok(value) = u32::from_str_radix(hex_tag, 16) {
                return Ok(Some(TlbTag {
                    value,
                    bits: (hex_tag.len() * 4) as u8,
                }));
            }
        }

        cx.error_spanned_by(lit, format!("failed to parse hex TLB tag: {string}"));
    } else if let Some(binary_tag) = string.strip_prefix('$') {
        if !binary_tag.is_empty() && binary_tag.len() <= 32 {
            if let Ok(value) = u32::from_str_radix(binary_tag, 2) {
                return Ok(Some(TlbTag {
                    value,
                    bits: binary_tag.len() as u8,
                }));
            }
        }

        cx.error_spanned_by(lit, format!("failed to parse binary TLB tag: {string}"));
    } else {
        cx.error_spanned_by(lit, format!("failed to parse TLB tag: {string}"));
    }

    Ok(None)
}

fn get_lit_str(
    cx: &Ctxt,
    attr_name: Symbol,
    meta: &ParseNestedMeta,
) -> syn::Result<Option<syn::LitStr>> {
    let expr: syn::Expr = meta.value()?.parse()?;
    let mut value = &expr;
    while let syn::Expr::Group(e) = value {
        value = &e.expr;
    }
    if let syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Str(lit),
        ..
    }) = value
    {
        let suffix = lit.suffix();
        if !suffix.is_empty() {
            cx.error_spanned_by(
                lit,
                format!("unexpected suffix `{}` on string literal", suffix),
            );
        }
        Ok(Some(lit.clone()))
    } else {
        cx.error_spanned_by(
            expr,
            format!(
                "expected {} attribute to be a string: `{} = \"...\"`",
                attr_name, attr_name
            ),
        );
        Ok(None)
    }
}

struct Attr<'c, T> {
    cx: &'c Ctxt,
    name: Symbol,
    value: Option<T>,
}

impl<'c, T> Attr<'c, T> {
    fn none(cx: &'c Ctxt, name: Symbol) -> Self {
        Self {
            cx,
            name,
            value: None,
        }
    }

    fn set<O>(&mut self, object: O, value: T)
    where
        O: ToTokens,
    {
        let tokens: TokenStream = object.into_token_stream();

        if self.value.is_some() {
            self.cx
                .error_spanned_by(tokens, format!("duplicated attribute `{}`", self.name));
        } else {
            self.value = Some(value);
        }
    }

    fn get(self) -> Option<T> {
        self.value
    }
}
