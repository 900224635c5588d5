use std::collections::BTreeSet;

use proc_macro::TokenStream;

use quote::quote;
use syn::{
    Attribute, Expr, ExprArray, ExprLit, ItemStruct, Lit, Meta, Token, parse::Parser,
    spanned::Spanned,
};

/// Declares a field adapter for one telemetry group.
///
/// ```ignore
/// #[Adapter(
///     group = Group::Environmental,
///     concepts = ["temperaturaC = temperaturaC | temperatura | temp", "co2"]
/// )]
/// pub struct EnvironmentalAdapter;
/// ```
///
/// Each concept entry is `name = key | key | ...`; keys are probed in order.
/// A bare `key | key` entry takes the first key as its canonical name.
#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn Adapter(attr: TokenStream, item: TokenStream) -> TokenStream {
    match adapter_impl(attr, item) {
        Ok(ts) => ts,
        Err(e) => e.to_compile_error().into(),
    }
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(syn::Error::new(expr.span(), "expected string literal")),
    }
}

fn expr_array_strings(expr: &Expr) -> syn::Result<Vec<(String, proc_macro2::Span)>> {
    let Expr::Array(ExprArray { elems, .. }) = expr else {
        return Err(syn::Error::new(expr.span(), "expected array literal"));
    };
    let mut out = Vec::new();
    for e in elems {
        out.push((lit_str(e)?, e.span()));
    }
    Ok(out)
}

fn drop_our_attrs(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs
        .iter()
        .filter(|a| !a.path().is_ident("Adapter"))
        .cloned()
        .collect()
}

struct ConceptMeta {
    name: String,
    keys: Vec<String>,
}

fn parse_concept(raw: &str, span: proc_macro2::Span) -> syn::Result<ConceptMeta> {
    let (name, keys) = match raw.split_once('=') {
        Some((lhs, rhs)) => (Some(lhs.trim().to_string()), rhs),
        None => (None, raw),
    };
    let keys: Vec<String> = keys
        .split('|')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let Some(first) = keys.first().cloned() else {
        return Err(syn::Error::new(span, format!("concept '{raw}' lists no keys")));
    };
    let name = name.unwrap_or(first);
    if name.is_empty() {
        return Err(syn::Error::new(span, format!("concept '{raw}' has an empty name")));
    }
    Ok(ConceptMeta { name, keys })
}

fn adapter_impl(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let mut st: ItemStruct = syn::parse(item)?;
    st.attrs = drop_our_attrs(&st.attrs);
    let struct_ident = st.ident.clone();

    let parser = syn::punctuated::Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr)?;

    let mut group: Option<Expr> = None;
    let mut concepts: Option<Vec<ConceptMeta>> = None;

    for m in metas {
        let Meta::NameValue(nv) = m else {
            return Err(syn::Error::new(m.span(), "expected key = value"));
        };
        let Some(key) = nv.path.get_ident().map(|i| i.to_string()) else {
            return Err(syn::Error::new(nv.path.span(), "expected ident key"));
        };
        let v = &nv.value;
        match key.as_str() {
            "group" => group = Some(v.clone()),
            "concepts" => {
                let mut seen = BTreeSet::new();
                let mut out = Vec::new();
                for (raw, span) in expr_array_strings(v)? {
                    let concept = parse_concept(&raw, span)?;
                    if !seen.insert(concept.name.clone()) {
                        return Err(syn::Error::new(
                            span,
                            format!("concept '{}' declared twice", concept.name),
                        ));
                    }
                    out.push(concept);
                }
                concepts = Some(out);
            }
            other => {
                return Err(syn::Error::new(
                    nv.path.span(),
                    format!("unknown Adapter attribute key '{other}'"),
                ));
            }
        }
    }

    let group =
        group.ok_or_else(|| syn::Error::new(struct_ident.span(), "Adapter: missing group"))?;
    let concepts = concepts
        .ok_or_else(|| syn::Error::new(struct_ident.span(), "Adapter: missing concepts"))?;

    let concept_exprs = concepts.iter().map(|c| {
        let name = &c.name;
        let keys = &c.keys;
        quote! {
            crate::adapter::Concept { name: #name, keys: &[#(#keys),*] }
        }
    });

    let expanded = quote! {
        #st

        impl #struct_ident {
            pub const GROUP: crate::model::Group = #group;
            pub const CONCEPTS: &'static [crate::adapter::Concept] = &[#(#concept_exprs),*];
        }

        impl crate::adapter::FieldAdapter for #struct_ident {
            fn group(&self) -> crate::model::Group {
                Self::GROUP
            }

            fn concepts(&self) -> &'static [crate::adapter::Concept] {
                Self::CONCEPTS
            }
        }
    };

    Ok(expanded.into())
}
