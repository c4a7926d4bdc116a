//! # Manifold Macros
//!
//! Derive macros for the Manifold record mapping layer:
//!
//! - `#[derive(Record)]` maps a named-field struct to a table. The table
//!   name is the struct's name verbatim, the field list is the declared
//!   field order, and an `id: i64` field is required.
//! - `#[derive(Ordinal)]` stores a fieldless enum as its 0-based
//!   declaration ordinal and generates the column conversions.
//!
//! Both expand against the `manifold_orm` crate, which re-exports them.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derive the `Record` trait for a named-field struct with an `id: i64`
/// field
#[proc_macro_derive(Record)]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_record(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "Record requires named fields",
        ));
    };

    let name = &input.ident;
    let table = name.to_string();

    let idents: Vec<&syn::Ident> = fields
        .named
        .iter()
        .map(|f| f.ident.as_ref().expect("named field has an ident"))
        .collect();
    let columns: Vec<String> = idents.iter().map(|ident| ident.to_string()).collect();

    if !columns.iter().any(|c| c == "id") {
        return Err(syn::Error::new_spanned(
            fields,
            "Record requires an `id: i64` field",
        ));
    }

    let expanded = quote! {
        impl ::manifold_orm::Record for #name {
            const TABLE: &'static str = #table;
            const FIELDS: &'static [&'static str] = &[#(#columns),*];

            fn from_row(
                row: &::manifold_orm::Row,
                columns: &::manifold_orm::ColumnIndex,
            ) -> ::std::result::Result<Self, ::manifold_orm::OrmError> {
                ::std::result::Result::Ok(Self {
                    #(#idents: {
                        let index = columns.index_of(#columns).ok_or_else(|| {
                            ::manifold_orm::OrmError::ColumnMismatch {
                                table: #table.to_string(),
                                detail: ::std::format!("no column for field '{}'", #columns),
                            }
                        })?;
                        ::manifold_orm::FromColumn::from_column(row, index, #columns)?
                    },)*
                })
            }

            fn sql_values(
                &self,
            ) -> ::std::vec::Vec<(&'static str, ::manifold_orm::SqlValue)> {
                ::std::vec![
                    #((#columns, ::manifold_orm::ToColumn::to_column(&self.#idents)),)*
                ]
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
    };
    Ok(expanded)
}

/// Derive the `Ordinal` trait (plus column conversions) for a fieldless
/// enum
#[proc_macro_derive(Ordinal)]
pub fn derive_ordinal(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_ordinal(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_ordinal(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Ordinal can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "Ordinal requires at least one variant",
        ));
    }
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Ordinal variants cannot carry fields",
            ));
        }
    }

    let name = &input.ident;
    let variants: Vec<&syn::Ident> = data.variants.iter().map(|v| &v.ident).collect();
    let ordinals: Vec<i64> = (0..variants.len() as i64).collect();

    let expanded = quote! {
        impl ::manifold_orm::Ordinal for #name {
            fn ordinal(&self) -> i64 {
                match self {
                    #(Self::#variants => #ordinals,)*
                }
            }

            fn from_ordinal(ordinal: i64) -> ::std::option::Option<Self> {
                match ordinal {
                    #(#ordinals => ::std::option::Option::Some(Self::#variants),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::manifold_orm::FromColumn for #name {
            fn from_column(
                row: &::manifold_orm::Row,
                index: usize,
                column: &str,
            ) -> ::std::result::Result<Self, ::manifold_orm::OrmError> {
                if row.is_null(index) {
                    return ::std::result::Result::Err(
                        ::manifold_orm::OrmError::NullValueForNonOptional {
                            column: column.to_string(),
                        },
                    );
                }
                match row.value(index) {
                    ::std::option::Option::Some(::manifold_orm::DbValue::Int(value)) => {
                        <Self as ::manifold_orm::Ordinal>::from_ordinal(*value).ok_or(
                            ::manifold_orm::OrmError::InvalidEnumOrdinal {
                                column: column.to_string(),
                                value: *value,
                            },
                        )
                    }
                    _ => ::std::result::Result::Err(::manifold_orm::OrmError::TypeMismatch {
                        column: column.to_string(),
                        expected: "enum ordinal",
                    }),
                }
            }
        }

        impl ::manifold_orm::ToColumn for #name {
            fn to_column(&self) -> ::manifold_orm::SqlValue {
                ::manifold_orm::SqlValue::Int(<Self as ::manifold_orm::Ordinal>::ordinal(self))
            }
        }
    };
    Ok(expanded)
}
