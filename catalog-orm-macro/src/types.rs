use syn::{GenericArgument, PathArguments, Type};

/// The family of SQL type a Rust field maps to, before attributes refine it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    Integer,
    BigInt,
    Boolean,
    Double,
    Text,
    Decimal,
    Timestamp,
}

/// Maps Rust types to their corresponding SQL types.
///
/// Returns a tuple containing:
/// 1. The SQL type family.
/// 2. A boolean indicating if the type is nullable (`Option<T>`).
pub fn rust_type_to_sql(ty: &Type) -> (SqlKind, bool) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let type_name = segment.ident.to_string();

            // Handle Option<T> for nullable columns
            if type_name == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
                        let (inner_kind, _) = rust_type_to_sql(inner_ty);
                        return (inner_kind, true);
                    }
                }
            }

            let kind = match type_name.as_str() {
                "i8" | "i16" | "i32" => SqlKind::Integer,
                "i64" => SqlKind::BigInt,
                "bool" => SqlKind::Boolean,
                "f32" | "f64" => SqlKind::Double,
                "Decimal" => SqlKind::Decimal,
                "DateTime" => SqlKind::Timestamp,
                _ => SqlKind::Text,
            };
            return (kind, false);
        }
    }
    (SqlKind::Text, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_nullable() {
        let ty: Type = syn::parse_quote!(Option<i64>);
        assert_eq!(rust_type_to_sql(&ty), (SqlKind::BigInt, true));
    }

    #[test]
    fn paths_match_on_last_segment() {
        let ty: Type = syn::parse_quote!(rust_decimal::Decimal);
        assert_eq!(rust_type_to_sql(&ty), (SqlKind::Decimal, false));
        let ty: Type = syn::parse_quote!(chrono::DateTime<chrono::Utc>);
        assert_eq!(rust_type_to_sql(&ty), (SqlKind::Timestamp, false));
    }
}
