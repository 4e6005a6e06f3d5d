//! `#[derive(BinaryCodec)]`: deterministic binary `Encode`/`Decode`.
//!
//! Structs encode their fields in declaration order. Enums encode a `u8` tag
//! followed by the variant's fields; tags follow Rust's discriminant rules, so
//! an explicit `Variant = 7` is honored and later variants count up from it.
//!
//! Generated code refers to `crate::types::encoding`, so the derive is only
//! usable inside the crate that owns those traits.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Expr, Fields, Lit, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => {
            let (pattern, encode) = encode_fields(&data.fields);
            let decode = decode_fields(&data.fields);
            (
                quote! {
                    let Self #pattern = self;
                    #encode
                },
                quote! { Ok(Self #decode) },
            )
        }
        Data::Enum(data) => enum_bodies(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Returns a destructuring pattern binding every field, plus the statements
/// that encode those bindings in order.
fn encode_fields(fields: &Fields) -> (TokenStream2, TokenStream2) {
    match fields {
        Fields::Unit => (quote! {}, quote! {}),
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            (
                quote! { { #(#idents),* } },
                quote! { #(crate::types::encoding::Encode::encode(#idents, out);)* },
            )
        }
        Fields::Unnamed(unnamed) => {
            let idents: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            (
                quote! { ( #(#idents),* ) },
                quote! { #(crate::types::encoding::Encode::encode(#idents, out);)* },
            )
        }
    }
}

/// Returns the constructor tail (`{ a: .., b: .. }`, `( .., .. )` or nothing).
fn decode_fields(fields: &Fields) -> TokenStream2 {
    let decode = quote! { crate::types::encoding::Decode::decode(input)? };
    match fields {
        Fields::Unit => quote! {},
        Fields::Named(named) => {
            let idents = named.named.iter().filter_map(|f| f.ident.as_ref());
            quote! { { #(#idents: #decode),* } }
        }
        Fields::Unnamed(unnamed) => {
            let values = (0..unnamed.unnamed.len()).map(|_| &decode);
            quote! { ( #(#values),* ) }
        }
    }
}

fn enum_bodies(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let mut encode_arms = Vec::new();
    let mut decode_arms = Vec::new();
    let mut next: u16 = 0;

    for variant in &data.variants {
        let tag = match &variant.discriminant {
            Some((_, expr)) => discriminant(expr)?,
            None => next,
        };
        if tag > u8::MAX as u16 {
            return Err(syn::Error::new_spanned(
                variant,
                "BinaryCodec enums are limited to 256 variants",
            ));
        }
        next = tag + 1;
        let tag = tag as u8;

        let ident = &variant.ident;
        let (pattern, encode) = encode_fields(&variant.fields);
        let decode = decode_fields(&variant.fields);
        encode_arms.push(quote! {
            Self::#ident #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #encode
            }
        });
        decode_arms.push(quote! { #tag => Ok(Self::#ident #decode), });
    }

    Ok((
        quote! {
            match self {
                #(#encode_arms)*
            }
        },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

fn discriminant(expr: &Expr) -> syn::Result<u16> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => int.base10_parse::<u16>(),
            _ => Err(syn::Error::new_spanned(expr, "discriminant must be an integer")),
        },
        Expr::Group(group) => discriminant(&group.expr),
        Expr::Paren(paren) => discriminant(&paren.expr),
        _ => Err(syn::Error::new_spanned(
            expr,
            "discriminant must be an integer literal",
        )),
    }
}
