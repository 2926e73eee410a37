use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{ext::IdentExt, Data, DeriveInput, Fields, Lit, LitInt, LitStr, Path};

use crate::types::{rust_type_to_sql, SqlKind};

/// Struct-level `#[orm(...)]` settings.
#[derive(Default)]
struct ModelAttrs {
    table: Option<String>,
    many_to_many: Vec<(String, Path)>,
}

/// Field-level `#[orm(...)]` settings.
#[derive(Default)]
struct FieldAttrs {
    primary_key: bool,
    auto_increment: bool,
    size: Option<usize>,
    max_digits: Option<u32>,
    decimal_places: Option<u32>,
    default: Option<String>,
    blank: bool,
    create_time: bool,
    update_time: bool,
    unique: bool,
    index: bool,
    foreign_key: Option<(Path, String)>,
    on_delete: Option<TokenStream>,
}

/// Expands the `#[derive(Model)]` macro.
///
/// This function parses the struct fields and `#[orm(...)]` attributes to generate:
/// 1. `ColumnInfo` metadata for each field.
/// 2. The `impl Model` block with `table_name`, `columns`, `to_values`, `from_row`
///    and the many-to-many relations.
pub fn expand(ast: DeriveInput) -> syn::Result<TokenStream> {
    let struct_name = &ast.ident;

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => return Err(syn::Error::new_spanned(&ast.ident, "Model must have named fields")),
        },
        _ => return Err(syn::Error::new_spanned(&ast.ident, "Model must be a struct")),
    };

    let model_attrs = parse_model_attrs(&ast)?;
    let model_name = struct_name.to_string().to_snake_case();
    let table_name = model_attrs.table.clone().unwrap_or_else(|| model_name.clone());

    let mut column_defs = Vec::new();
    let mut value_entries = Vec::new();
    let mut field_reads = Vec::new();

    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let column_name = ident.unraw().to_string();
        let attrs = parse_field_attrs(field)?;
        let (kind, is_nullable) = rust_type_to_sql(&field.ty);

        // fixed-point values are read back at their declared scale
        let scale = match (kind, attrs.decimal_places) {
            (SqlKind::Decimal, Some(decimal_places)) => Some(decimal_places),
            _ => None,
        };

        let sql_type = match kind {
            SqlKind::Integer => quote! { catalog_orm::SqlType::Integer },
            SqlKind::BigInt => quote! { catalog_orm::SqlType::BigInt },
            SqlKind::Boolean => quote! { catalog_orm::SqlType::Boolean },
            SqlKind::Double => quote! { catalog_orm::SqlType::Double },
            SqlKind::Timestamp => quote! { catalog_orm::SqlType::Timestamp },
            SqlKind::Text => match attrs.size {
                Some(size) => quote! { catalog_orm::SqlType::Varchar(#size) },
                None => quote! { catalog_orm::SqlType::Text },
            },
            SqlKind::Decimal => {
                let (Some(max_digits), Some(decimal_places)) = (attrs.max_digits, attrs.decimal_places) else {
                    return Err(syn::Error::new_spanned(
                        field,
                        "Decimal fields need #[orm(max_digits = .., decimal_places = ..)]",
                    ));
                };
                if decimal_places > max_digits {
                    return Err(syn::Error::new_spanned(field, "decimal_places cannot exceed max_digits"));
                }
                quote! { catalog_orm::SqlType::Decimal { max_digits: #max_digits, decimal_places: #decimal_places } }
            }
        };

        let default_tokens = match &attrs.default {
            Some(literal) => quote! { Some(#literal) },
            None => quote! { None },
        };

        let foreign_key_tokens = match &attrs.foreign_key {
            Some((model, column)) => {
                let on_delete = attrs.on_delete.clone().unwrap_or_else(|| quote! { catalog_orm::OnDelete::NoAction });
                quote! {
                    Some(catalog_orm::ForeignKey {
                        table: <#model as catalog_orm::Model>::table_name(),
                        column: #column,
                        on_delete: #on_delete,
                    })
                }
            }
            None => {
                if attrs.on_delete.is_some() {
                    return Err(syn::Error::new_spanned(field, "on_delete requires foreign_key"));
                }
                quote! { None }
            }
        };

        let is_primary_key = attrs.primary_key;
        let auto_increment = attrs.auto_increment;
        let blank = attrs.blank;
        let create_time = attrs.create_time;
        let update_time = attrs.update_time;
        let unique = attrs.unique;
        // foreign keys are always indexed
        let index = attrs.index || attrs.foreign_key.is_some();

        column_defs.push(quote! {
            catalog_orm::ColumnInfo {
                name: #column_name,
                sql_type: #sql_type,
                is_primary_key: #is_primary_key,
                auto_increment: #auto_increment,
                is_nullable: #is_nullable,
                blank: #blank,
                default: #default_tokens,
                create_time: #create_time,
                update_time: #update_time,
                unique: #unique,
                index: #index,
                foreign_key: #foreign_key_tokens,
            }
        });
        value_entries.push(quote! {
            (#column_name, catalog_orm::ColumnValue::to_value(&self.#ident))
        });
        field_reads.push(match scale {
            Some(decimal_places) => quote! {
                #ident: catalog_orm::ColumnValue::rescaled(
                    catalog_orm::ColumnValue::from_row(row, #column_name)?,
                    #decimal_places,
                )
            },
            None => quote! {
                #ident: catalog_orm::ColumnValue::from_row(row, #column_name)?
            },
        });
    }

    let relations = model_attrs.many_to_many.iter().map(|(field, target)| {
        quote! { catalog_orm::ManyToManyInfo::new::<Self, #target>(#field) }
    });

    Ok(quote! {
        impl catalog_orm::Model for #struct_name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn model_name() -> &'static str {
                #model_name
            }

            fn columns() -> Vec<catalog_orm::ColumnInfo> {
                vec![#(#column_defs),*]
            }

            fn many_to_many() -> Vec<catalog_orm::ManyToManyInfo> {
                vec![#(#relations),*]
            }

            fn to_values(&self) -> Vec<(&'static str, catalog_orm::Value)> {
                vec![#(#value_entries),*]
            }

            fn from_row(row: &catalog_orm::AnyRow) -> ::std::result::Result<Self, catalog_orm::sqlx::Error> {
                Ok(Self {
                    #(#field_reads),*
                })
            }
        }
    })
}

fn parse_model_attrs(ast: &DeriveInput) -> syn::Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();

    for attr in &ast.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.table = Some(value.value());
                return Ok(());
            }

            if meta.path.is_ident("many_to_many") {
                return meta.parse_nested_meta(|relation| {
                    let field = relation
                        .path
                        .get_ident()
                        .ok_or_else(|| relation.error("expected a relation name"))?
                        .to_string();
                    let target: LitStr = relation.value()?.parse()?;
                    attrs.many_to_many.push((field, target.parse()?));
                    Ok(())
                });
            }

            Err(meta.error("unsupported model attribute"))
        })?;
    }

    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                attrs.auto_increment = true;
            } else if meta.path.is_ident("size") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.size = Some(value.base10_parse::<usize>()?);
            } else if meta.path.is_ident("max_digits") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.max_digits = Some(value.base10_parse::<u32>()?);
            } else if meta.path.is_ident("decimal_places") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.decimal_places = Some(value.base10_parse::<u32>()?);
            } else if meta.path.is_ident("default") {
                let literal: Lit = meta.value()?.parse()?;
                attrs.default = Some(match literal {
                    Lit::Int(value) => value.base10_digits().to_string(),
                    Lit::Float(value) => value.base10_digits().to_string(),
                    Lit::Bool(value) => (if value.value { "TRUE" } else { "FALSE" }).to_string(),
                    Lit::Str(value) => format!("'{}'", value.value().replace('\'', "''")),
                    _ => return Err(meta.error("unsupported default literal")),
                });
            } else if meta.path.is_ident("blank") {
                attrs.blank = true;
            } else if meta.path.is_ident("create_time") {
                attrs.create_time = true;
            } else if meta.path.is_ident("update_time") {
                attrs.update_time = true;
            } else if meta.path.is_ident("unique") {
                attrs.unique = true;
            } else if meta.path.is_ident("index") {
                attrs.index = true;
            } else if meta.path.is_ident("foreign_key") {
                let value: LitStr = meta.value()?.parse()?;
                let fk_string = value.value();
                let Some((model, column)) = fk_string.rsplit_once("::") else {
                    return Err(meta.error("Invalid format for foreign_key. Use 'Model::column'"));
                };
                let model: Path = syn::parse_str(model).map_err(|e| meta.error(e))?;
                attrs.foreign_key = Some((model, column.to_string()));
            } else if meta.path.is_ident("on_delete") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.on_delete = Some(match value.value().as_str() {
                    "cascade" => quote! { catalog_orm::OnDelete::Cascade },
                    "restrict" => quote! { catalog_orm::OnDelete::Restrict },
                    "set_null" => quote! { catalog_orm::OnDelete::SetNull },
                    "no_action" => quote! { catalog_orm::OnDelete::NoAction },
                    _ => return Err(meta.error("on_delete must be cascade, restrict, set_null or no_action")),
                });
            } else {
                return Err(meta.error("unsupported orm attribute"));
            }
            Ok(())
        })?;
    }

    Ok(attrs)
}
