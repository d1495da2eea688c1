//! TypeScript rendering
//!
//! Pure text production: everything here consumes resolved declarations and
//! never looks at schemas directly.

use std::fmt;

use serde_json::Value;

use super::resolve::{Declaration, DeclarationKind, FieldDecl, TsType};

impl fmt::Display for TsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TsType::Keyword(keyword) => f.write_str(keyword),
            TsType::Ref(ident) => f.write_str(ident),
            TsType::Literal(value) => write!(f, "{}", value),
            TsType::Array(inner) => match inner.as_ref() {
                TsType::Union(_) => write!(f, "({})[]", inner),
                _ => write!(f, "{}[]", inner),
            },
            TsType::Tuple(elements) => {
                f.write_str("[")?;
                write_joined(f, elements, ", ")?;
                f.write_str("]")
            }
            TsType::Record(key, value) => write!(f, "Record<{}, {}>", key, value),
            TsType::Union(members) => write_joined(f, members, " | "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[TsType], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Quote a property or endpoint name
pub fn quoted(name: &str) -> String {
    Value::from(name).to_string()
}

/// Render a single field line without indentation.
///
/// Unions are parenthesized, then `[]` is appended for repeated fields and
/// ` | undefined` for optional ones, in that order.
pub fn render_field(field: &FieldDecl) -> String {
    let mut out = format!("{}: ", quoted(&field.name));
    match &field.ty {
        TsType::Union(_) => out.push_str(&format!("({})", field.ty)),
        other => out.push_str(&other.to_string()),
    }
    if field.repeated {
        out.push_str("[]");
    }
    if field.optional {
        out.push_str(" | undefined");
    }
    out
}

/// Render a declaration without the `export` keyword
pub fn render_declaration(declaration: &Declaration) -> String {
    match &declaration.kind {
        DeclarationKind::Interface(fields) => {
            let mut out = format!("interface {} {{\n", declaration.ident);
            for field in fields {
                out.push_str("    ");
                out.push_str(&render_field(field));
                out.push('\n');
            }
            out.push('}');
            out
        }
        DeclarationKind::Alias(ty) => format!("type {} = {}", declaration.ident, ty),
    }
}
