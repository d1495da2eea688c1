//! Type Resolution Pass
//!
//! Walks [`TypeDescriptor`] trees and turns them into target type
//! expressions plus the named declarations those expressions refer to.
//!
//! Field rules, in precedence order:
//! 1. `Optional` is unwrapped and the field marked optional
//! 2. `List` is unwrapped and the field marked repeated
//! 3. everything else goes through [`TypeResolver::resolve_type`]
//!
//! Objects are memoized on identity within one pass, so each one is declared
//! once. An object reached again while its own fields are still being
//! resolved is a cycle and fails the pass.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::imports::ImportTable;
use super::names::NameAllocator;
use crate::error::{ContractError, Result};
use crate::schema::{Field, LiteralValue, ObjectRef, Primitive, TypeDescriptor};

// =============================================================================
// Resolved Types
// =============================================================================

/// A target type expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TsType {
    /// `number`, `string`, `boolean`, `undefined`, `any`
    Keyword(&'static str),
    /// A declared or imported identifier
    Ref(String),
    Literal(LiteralValue),
    Array(Box<TsType>),
    Tuple(Vec<TsType>),
    Record(Box<TsType>, Box<TsType>),
    Union(Vec<TsType>),
}

/// One resolved interface field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TsType,
    pub repeated: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Interface(Vec<FieldDecl>),
    Alias(TsType),
}

/// A named top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub ident: String,
    pub kind: DeclarationKind,
}

fn keyword(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Int | Primitive::Float => "number",
        Primitive::Str | Primitive::Decimal | Primitive::Uuid => "string",
        Primitive::Bool => "boolean",
        Primitive::None => "undefined",
    }
}

// =============================================================================
// Type Resolver
// =============================================================================

/// Per-pass resolution state
#[derive(Debug, Default)]
pub struct TypeResolver {
    names: NameAllocator,
    imports: ImportTable,

    /// ident -> declaration, in emission order
    declarations: IndexMap<String, Declaration>,

    /// object identity -> ident
    memo: HashMap<(String, usize), String>,

    /// schema name -> idents declared for it
    by_name: HashMap<String, Vec<String>>,

    /// Identities of the objects whose fields are being resolved right now
    stack: Vec<(String, usize)>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver using a caller-supplied allocator
    pub fn with_names(names: NameAllocator) -> Self {
        Self {
            names,
            ..Self::default()
        }
    }

    /// Declare `object` under a fresh identifier derived from `base`,
    /// bypassing the identity memo.
    ///
    /// Used for endpoint-level request and response interfaces, which are
    /// named after the endpoint rather than the schema.
    pub fn declare_root(&mut self, base: &str, object: &ObjectRef, path: &str) -> Result<String> {
        let ident = self.names.allocate(base);

        self.stack.push(object.identity());
        let fields = self.resolve_fields(object, path);
        self.stack.pop();

        self.declarations.insert(
            ident.clone(),
            Declaration {
                ident: ident.clone(),
                kind: DeclarationKind::Interface(fields?),
            },
        );
        Ok(ident)
    }

    /// Resolve a nested object to its declared identifier
    pub fn resolve_object(&mut self, object: &ObjectRef, path: &str) -> Result<String> {
        let key = object.identity();
        if let Some(ident) = self.memo.get(&key) {
            return Ok(ident.clone());
        }

        if let Some(start) = self.stack.iter().position(|entry| *entry == key) {
            let mut chain: Vec<String> = self.stack[start..].iter().map(|(name, _)| name.clone()).collect();
            chain.push(object.name().to_string());
            return Err(ContractError::SchemaCycle { chain });
        }

        self.stack.push(key.clone());
        let fields = self.resolve_fields(object, object.name());
        self.stack.pop();

        let ident = self.intern(object.name(), DeclarationKind::Interface(fields?));
        tracing::trace!(schema = object.name(), ident = %ident, at = path, "Resolved object");
        self.memo.insert(key, ident.clone());
        Ok(ident)
    }

    fn resolve_fields(&mut self, object: &ObjectRef, path: &str) -> Result<Vec<FieldDecl>> {
        object
            .fields()
            .iter()
            .map(|field| self.resolve_field(field, &format!("{}.{}", path, field.name)))
            .collect()
    }

    /// Resolve one field, applying the optional and repeated wrappers
    pub fn resolve_field(&mut self, field: &Field, path: &str) -> Result<FieldDecl> {
        let (inner, optional) = match &field.ty {
            TypeDescriptor::Optional(inner) => (inner.as_ref(), true),
            other => (other, false),
        };
        let (inner, repeated) = match inner {
            TypeDescriptor::List(inner) => (inner.as_ref(), true),
            other => (other, false),
        };

        Ok(FieldDecl {
            name: field.name.clone(),
            ty: self.resolve_type(inner, path)?,
            repeated,
            optional,
        })
    }

    /// Resolve a bare type expression
    pub fn resolve_type(&mut self, ty: &TypeDescriptor, path: &str) -> Result<TsType> {
        match ty {
            TypeDescriptor::Primitive(primitive) => Ok(TsType::Keyword(keyword(*primitive))),

            TypeDescriptor::Optional(inner) => Ok(TsType::Union(vec![
                self.resolve_type(inner, path)?,
                TsType::Keyword("undefined"),
            ])),

            TypeDescriptor::List(inner) => Ok(TsType::Array(Box::new(self.resolve_type(inner, path)?))),

            TypeDescriptor::Tuple(elements) => {
                if elements.is_empty() {
                    return Err(ContractError::unsupported(ty, path, "empty tuple"));
                }
                let elements = elements
                    .iter()
                    .map(|element| self.resolve_type(element, path))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TsType::Tuple(elements))
            }

            TypeDescriptor::Dict { key, value } => {
                let key = match key.as_ref() {
                    TypeDescriptor::Primitive(
                        Primitive::Str | Primitive::Uuid | Primitive::Decimal | Primitive::Int | Primitive::Float,
                    )
                    | TypeDescriptor::Enum(_)
                    | TypeDescriptor::Literal(_) => self.resolve_type(key, path)?,
                    other => {
                        return Err(ContractError::unsupported(
                            other,
                            path,
                            "mapping keys must be string or number types",
                        ))
                    }
                };
                let value = self.resolve_type(value, path)?;
                Ok(TsType::Record(Box::new(key), Box::new(value)))
            }

            TypeDescriptor::AnyDict => Ok(TsType::Record(
                Box::new(TsType::Keyword("string")),
                Box::new(TsType::Keyword("any")),
            )),

            TypeDescriptor::Union(variants) => {
                if variants.len() < 2 {
                    return Err(ContractError::unsupported(ty, path, "a union needs at least two members"));
                }
                let members = variants
                    .iter()
                    .map(|variant| match variant {
                        TypeDescriptor::Object(object) => self.resolve_object(object, path).map(TsType::Ref),
                        other => Err(ContractError::unsupported(other, path, "union members must be objects")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TsType::Union(members))
            }

            TypeDescriptor::Literal(value) => Ok(TsType::Literal(value.clone())),

            TypeDescriptor::Enum(schema) => {
                let mut values: Vec<TsType> = schema
                    .values
                    .iter()
                    .map(|value| TsType::Literal(LiteralValue::Str(value.clone())))
                    .collect();
                let body = match values.len() {
                    0 => return Err(ContractError::unsupported(ty, path, "enum has no values")),
                    1 => values.remove(0),
                    _ => TsType::Union(values),
                };
                Ok(TsType::Ref(self.intern(&schema.name, DeclarationKind::Alias(body))))
            }

            TypeDescriptor::Object(object) => Ok(TsType::Ref(self.resolve_object(object, path)?)),

            TypeDescriptor::Imported { module, symbol } => {
                self.import(module, symbol)?;
                Ok(TsType::Ref(symbol.clone()))
            }

            TypeDescriptor::Opaque(_) => Err(ContractError::unsupported(ty, path, "no TypeScript mapping")),
        }
    }

    fn import(&mut self, module: &str, symbol: &str) -> Result<()> {
        match self.imports.module_of(symbol) {
            Some(existing) if existing == module => return Ok(()),
            Some(_) => {
                return Err(ContractError::ImportCollision {
                    symbol: symbol.to_string(),
                    module: module.to_string(),
                })
            }
            None => {}
        }
        if !self.names.reserve(symbol) {
            return Err(ContractError::ImportCollision {
                symbol: symbol.to_string(),
                module: module.to_string(),
            });
        }
        self.imports.add(module, symbol);
        Ok(())
    }

    /// Reuse an identical declaration of the same schema name, or declare a new one
    fn intern(&mut self, schema_name: &str, kind: DeclarationKind) -> String {
        if let Some(idents) = self.by_name.get(schema_name) {
            let existing = idents.iter().find(|ident| {
                self.declarations
                    .get(ident.as_str())
                    .map_or(false, |declaration| declaration.kind == kind)
            });
            if let Some(ident) = existing {
                return ident.clone();
            }
        }

        let ident = self.names.allocate(schema_name);
        self.by_name
            .entry(schema_name.to_string())
            .or_default()
            .push(ident.clone());
        self.declarations.insert(
            ident.clone(),
            Declaration {
                ident: ident.clone(),
                kind,
            },
        );
        ident
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// Consume the pass, yielding imports and declarations in emission order
    pub fn finish(self) -> (ImportTable, Vec<Declaration>) {
        (self.imports, self.declarations.into_values().collect())
    }
}
