use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Implements `bizform::form::FormValues` for a struct with named fields and
/// generates a `<Name>Fields` accessor returning each field's `FieldName`.
#[proc_macro_derive(FormValues)]
pub fn derive_form_values(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FormValues derive supports only non-generic structs",
        ));
    }

    let named = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "FormValues derive requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "FormValues derive is only supported on structs",
            ));
        }
    };

    let bizform = bizform_path();
    let model = input.ident;
    let vis = input.vis;
    let fields_struct = format_ident!("{model}Fields");

    let mut accessors = Vec::new();
    let mut writes = Vec::new();
    let mut reads = Vec::new();

    for field in named {
        let Some(ident) = field.ident else {
            continue;
        };
        let name = ident.to_string();
        let name = name.strip_prefix("r#").unwrap_or(&name).to_string();

        accessors.push(quote! {
            pub fn #ident(&self) -> #bizform::form::FieldName {
                #bizform::form::FieldName::from(#name)
            }
        });
        writes.push(quote! {
            values.insert(
                #bizform::form::FieldName::from(#name),
                #bizform::form::IntoFieldValue::to_field_value(&self.#ident),
            );
        });
        reads.push(quote! {
            #ident: #bizform::form::read_field(values, #name)?,
        });
    }

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        #vis struct #fields_struct;

        impl #fields_struct {
            #(#accessors)*
        }

        impl #bizform::form::FormValues for #model {
            type Fields = #fields_struct;

            fn fields() -> Self::Fields {
                #fields_struct
            }

            fn to_values(&self) -> #bizform::form::Values {
                let mut values = #bizform::form::Values::new();
                #(#writes)*
                values
            }

            fn from_values(
                values: &#bizform::form::Values,
            ) -> ::core::result::Result<Self, #bizform::form::FieldValueError> {
                ::core::result::Result::Ok(Self {
                    #(#reads)*
                })
            }
        }
    })
}

fn bizform_path() -> TokenStream2 {
    match crate_name("bizform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        // The crate declares `extern crate self as bizform`.
        Ok(FoundCrate::Itself) | Err(_) => quote!(::bizform),
    }
}
