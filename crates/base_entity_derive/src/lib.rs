use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{
    Expr, ExprLit, Fields, Ident, ItemStruct, Lit, Meta, Path, Token, parse_macro_input, parse_str,
    punctuated::Punctuated,
};

/// Column names and trait location used when expanding `#[base_entity]`.
struct AuditColumns {
    traits_path: Path,
    active_model_ident: Ident,
    id_field: Ident,
    created_at_field: Ident,
    updated_at_field: Ident,
}

impl Default for AuditColumns {
    fn default() -> Self {
        let span = proc_macro2::Span::call_site();
        Self {
            traits_path: parse_str("crate::db::dao::base_traits")
                .expect("default traits path should parse"),
            active_model_ident: Ident::new("ActiveModel", span),
            id_field: Ident::new("id", span),
            created_at_field: Ident::new("created_at", span),
            updated_at_field: Ident::new("updated_at", span),
        }
    }
}

/// Prepends an auto-increment `i32` primary key and the two audit timestamps to a
/// sea-orm model, then wires the model into the DAO traits.
///
/// Fields already declared on the struct are left untouched, so an entity can
/// override any of the injected columns.
#[proc_macro_attribute]
pub fn base_entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr with Punctuated<Meta, Token![,]>::parse_terminated);
    let mut columns = AuditColumns::default();
    if let Err(err) = apply_args(&mut columns, args) {
        return err.to_compile_error().into();
    }

    let mut input = parse_macro_input!(item as ItemStruct);
    let Fields::Named(fields) = &mut input.fields else {
        return syn::Error::new_spanned(input, "base_entity requires a struct with named fields")
            .to_compile_error()
            .into();
    };

    let declared: HashSet<String> = fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref().map(ToString::to_string))
        .collect();

    let mut merged = Punctuated::new();

    if !declared.contains(&columns.id_field.to_string()) {
        let id_ident = &columns.id_field;
        merged.push(syn::parse_quote! {
            #[sea_orm(primary_key)]
            pub #id_ident: i32
        });
    }

    for ident in [&columns.created_at_field, &columns.updated_at_field] {
        if !declared.contains(&ident.to_string()) {
            merged.push(syn::parse_quote! {
                #[sea_orm(default_expr = "Expr::current_timestamp()")]
                pub #ident: sea_orm::entity::prelude::DateTimeWithTimeZone
            });
        }
    }

    merged.extend(fields.named.iter().cloned());
    fields.named = merged;

    let AuditColumns {
        traits_path,
        active_model_ident,
        created_at_field,
        updated_at_field,
        ..
    } = columns;

    let expanded = quote! {
        #input

        impl #traits_path::TimestampedActiveModel for #active_model_ident {
            fn set_created_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone) {
                self.#created_at_field = sea_orm::ActiveValue::Set(ts);
            }

            fn set_updated_at(&mut self, ts: sea_orm::entity::prelude::DateTimeWithTimeZone) {
                self.#updated_at_field = sea_orm::ActiveValue::Set(ts);
            }
        }

        impl #traits_path::HasCreatedAtColumn for Entity {
            fn created_at_column() -> Column {
                Column::CreatedAt
            }
        }
    };

    expanded.into()
}

fn apply_args(
    columns: &mut AuditColumns,
    args: Punctuated<Meta, Token![,]>,
) -> Result<(), syn::Error> {
    for meta in args {
        let Meta::NameValue(name_value) = meta else {
            return Err(syn::Error::new_spanned(
                meta,
                "expected name-value pair, e.g. traits = \"path::to::traits\"",
            ));
        };

        let Some(key) = name_value.path.get_ident().map(ToString::to_string) else {
            return Err(syn::Error::new_spanned(
                name_value.path,
                "expected simple identifier for attribute key",
            ));
        };

        let Expr::Lit(ExprLit {
            lit: Lit::Str(value),
            ..
        }) = name_value.value
        else {
            return Err(syn::Error::new_spanned(
                name_value.value,
                "expected string literal for attribute value",
            ));
        };

        let ident = || Ident::new(&value.value(), value.span());
        match key.as_str() {
            "traits" => {
                columns.traits_path = value.parse::<Path>().map_err(|err| {
                    syn::Error::new(value.span(), format!("invalid traits path: {err}"))
                })?;
            }
            "active_model" => columns.active_model_ident = ident(),
            "id" => columns.id_field = ident(),
            "created_at" => columns.created_at_field = ident(),
            "updated_at" => columns.updated_at_field = ident(),
            _ => {
                return Err(syn::Error::new(
                    value.span(),
                    format!("unknown base_entity attribute key `{key}`"),
                ));
            }
        }
    }

    Ok(())
}
