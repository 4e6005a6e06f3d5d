//! `#[derive(Error)]` for error enums and structs.
//!
//! ```ignore
//! #[derive(Debug, Error)]
//! pub enum AvmError {
//!     #[error("undefined label: {label}")]
//!     UndefinedLabel { label: String },
//!     #[error("division by zero at {0}")]
//!     DivisionByZero(usize),
//!     #[error("step limit exceeded")]
//!     StepLimitExceeded,
//! }
//! ```
//!
//! Only fields that the message actually interpolates are passed to `write!`,
//! so a variant may carry context that its message leaves out.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message(&variant.attrs, variant)?;
                    let (pattern, write) = display_fields(&variant.fields, &message);
                    Ok(quote! { Self::#ident #pattern => #write, })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message(&input.attrs, &input.ident)?;
            let (pattern, write) = display_fields(&data.fields, &message);
            quote! {
                let Self #pattern = self;
                #write
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds the destructuring pattern and the `write!` call for one set of fields.
fn display_fields(fields: &Fields, message: &str) -> (TokenStream2, TokenStream2) {
    match fields {
        Fields::Unit => (quote! {}, quote! { write!(f, #message) }),
        Fields::Named(named) => {
            let mut bindings = Vec::new();
            let mut args = Vec::new();
            for field in &named.named {
                let Some(ident) = &field.ident else { continue };
                if interpolates(message, &ident.to_string()) {
                    bindings.push(quote! { #ident });
                    args.push(quote! { #ident = #ident });
                } else {
                    bindings.push(quote! { #ident: _ });
                }
            }
            (
                quote! { { #(#bindings),* } },
                quote! { write!(f, #message, #(#args),*) },
            )
        }
        Fields::Unnamed(unnamed) => {
            let mut format = message.to_string();
            let mut bindings = Vec::new();
            let mut args = Vec::new();
            for i in (0..unnamed.unnamed.len()).rev() {
                let binding = format_ident!("f{}", i);
                let positional = i.to_string();
                if interpolates(&format, &positional) {
                    format = format
                        .replace(&format!("{{{positional}}}"), &format!("{{{binding}}}"))
                        .replace(&format!("{{{positional}:"), &format!("{{{binding}:"));
                    args.push(quote! { #binding = #binding });
                    bindings.push(quote! { #binding });
                } else {
                    bindings.push(quote! { _ });
                }
            }
            bindings.reverse();
            (
                quote! { ( #(#bindings),* ) },
                quote! { write!(f, #format, #(#args),*) },
            )
        }
    }
}

/// Returns true if `message` contains `{name}` or `{name:...}`.
fn interpolates(message: &str, name: &str) -> bool {
    message.contains(&format!("{{{name}}}")) || message.contains(&format!("{{{name}:"))
}

fn message<T: ToTokens>(attrs: &[syn::Attribute], target: &T) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            "missing #[error(\"...\")] attribute",
        ));
    };
    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };
    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(s)) => Ok(s.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] message must be a string literal",
        )),
    }
}
