//! Schema descriptions
//!
//! Request and response types expose their shape through [`Describe`]. The
//! resulting [`TypeDescriptor`] tree is the one source read by both the
//! TypeScript generator and the request coercion pipeline, so the two can
//! never disagree about what a route accepts.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Primitives & Literals
// =============================================================================

/// Scalar kinds understood by the generator and the coercion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Int,
    Str,
    Bool,
    Float,
    /// Arbitrary-precision decimal, carried as a string on the wire
    Decimal,
    Uuid,
    None,
}

impl Primitive {
    /// Name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Str => "string",
            Primitive::Bool => "bool",
            Primitive::Float => "float",
            Primitive::Decimal => "decimal",
            Primitive::Uuid => "uuid",
            Primitive::None => "none",
        }
    }
}

/// A single literal value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LiteralValue {
    /// The JSON value this literal stands for
    pub fn to_value(&self) -> Value {
        match self {
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Int(i) => Value::from(*i),
            LiteralValue::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // JSON spelling doubles as TypeScript literal syntax
        write!(f, "{}", self.to_value())
    }
}

/// A named enumeration of string values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumSchema {
    /// Create an enumeration from its name and values
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether `value` is one of the declared values
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

// =============================================================================
// Objects
// =============================================================================

/// Produces the fields of an object on demand.
///
/// Deferring field construction lets a type mention itself (directly or
/// through other types) without building an infinite descriptor tree.
pub type FieldsFn = fn() -> Vec<Field>;

#[derive(Clone)]
enum FieldSource {
    Fixed(Arc<[Field]>),
    Deferred(FieldsFn),
}

/// A named, field-ordered object schema.
///
/// Objects compare equal by name. The generator additionally tracks the
/// field source so two distinct schemas sharing a name still get distinct
/// declarations.
#[derive(Clone)]
pub struct ObjectRef {
    name: String,
    source: FieldSource,
}

impl ObjectRef {
    /// An object with a fixed field list
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Fixed(fields.into()),
        }
    }

    /// An object whose fields are produced when first needed
    pub fn deferred(name: impl Into<String>, fields: FieldsFn) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Deferred(fields),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declared order
    pub fn fields(&self) -> Cow<'_, [Field]> {
        match &self.source {
            FieldSource::Fixed(fields) => Cow::Borrowed(&fields[..]),
            FieldSource::Deferred(fields) => Cow::Owned(fields()),
        }
    }

    /// Look up a single field by name
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields().iter().find(|f| f.name == name).cloned()
    }

    /// Identity of this schema within one process: its name plus the
    /// address of its field source.
    pub(crate) fn identity(&self) -> (String, usize) {
        let address = match &self.source {
            FieldSource::Fixed(fields) => Arc::as_ptr(fields) as *const Field as usize,
            FieldSource::Deferred(fields) => *fields as usize,
        };
        (self.name.clone(), address)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fields are left out: a self-referential schema would never finish printing
        f.debug_struct("ObjectRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A single object field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Wire name of the field
    pub name: String,
    /// Declared type
    pub ty: TypeDescriptor,
    /// Value applied when the field is omitted from a request
    pub default: Option<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// A field typed by a [`Describe`] implementation
    pub fn of<T: Describe>(name: impl Into<String>) -> Self {
        Self::new(name, T::describe())
    }

    /// Set the value used when the field is omitted
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.ty, TypeDescriptor::Optional(_))
    }
}

// =============================================================================
// Type Descriptor
// =============================================================================

/// Structural description of a type, independent of any target syntax
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Optional(Box<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Tuple(Vec<TypeDescriptor>),
    Dict {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    /// Untyped string-keyed mapping
    AnyDict,
    /// Two or more object variants
    Union(Vec<TypeDescriptor>),
    Literal(LiteralValue),
    Enum(EnumSchema),
    Object(ObjectRef),
    /// A type declared by a client-side module and imported into the artifact
    Imported { module: String, symbol: String },
    /// A type with no mapping. Always rejected by the generator.
    Opaque(String),
}

impl TypeDescriptor {
    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    pub fn dict(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn literal(value: impl Into<LiteralValue>) -> Self {
        TypeDescriptor::Literal(value.into())
    }

    pub fn imported(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        TypeDescriptor::Imported {
            module: module.into(),
            symbol: symbol.into(),
        }
    }

    /// The object schema, if this descriptor is one
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            TypeDescriptor::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::Str(value.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::Str(value)
    }
}

impl From<i64> for LiteralValue {
    fn from(value: i64) -> Self {
        LiteralValue::Int(value)
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Bool(value)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[TypeDescriptor], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(p) => f.write_str(p.name()),
            TypeDescriptor::Optional(inner) => write!(f, "optional<{}>", inner),
            TypeDescriptor::List(inner) => write!(f, "list<{}>", inner),
            TypeDescriptor::Tuple(elements) => {
                f.write_str("tuple<")?;
                write_joined(f, elements, ", ")?;
                f.write_str(">")
            }
            TypeDescriptor::Dict { key, value } => write!(f, "dict<{}, {}>", key, value),
            TypeDescriptor::AnyDict => f.write_str("dict"),
            TypeDescriptor::Union(variants) => {
                f.write_str("union<")?;
                write_joined(f, variants, " | ")?;
                f.write_str(">")
            }
            TypeDescriptor::Literal(value) => write!(f, "literal<{}>", value),
            TypeDescriptor::Enum(schema) => write!(f, "enum {}", schema.name),
            TypeDescriptor::Object(object) => write!(f, "object {}", object.name()),
            TypeDescriptor::Imported { module, symbol } => write!(f, "{} from {:?}", symbol, module),
            TypeDescriptor::Opaque(name) => f.write_str(name),
        }
    }
}

// =============================================================================
// Describe
// =============================================================================

/// Explicit schema-description capability.
///
/// Every request parameter set and every response kind implements this;
/// nothing in the crate inspects types at runtime.
pub trait Describe {
    fn describe() -> TypeDescriptor;
}

/// Arbitrary-precision decimal carried in its textual form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(String);

impl Decimal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! describe_as {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::Primitive($kind)
                }
            }
        )+
    };
}

describe_as!(Primitive::Int => i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);
describe_as!(Primitive::Float => f32, f64);
describe_as!(Primitive::Bool => bool);
describe_as!(Primitive::Str => String);
describe_as!(Primitive::Uuid => uuid::Uuid);
describe_as!(Primitive::Decimal => Decimal);
describe_as!(Primitive::None => ());

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::optional(T::describe())
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::list(T::describe())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<K: Describe, V: Describe> Describe for HashMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::dict(K::describe(), V::describe())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::dict(K::describe(), V::describe())
    }
}

impl Describe for serde_json::Map<String, Value> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::AnyDict
    }
}

macro_rules! describe_tuple {
    ($($name:ident),+) => {
        impl<$($name: Describe),+> Describe for ($($name,)+) {
            fn describe() -> TypeDescriptor {
                TypeDescriptor::Tuple(vec![$($name::describe()),+])
            }
        }
    };
}

describe_tuple!(A, B);
describe_tuple!(A, B, C);
describe_tuple!(A, B, C, D);

/// Implement [`Describe`] for a struct whose fields all come from other
/// [`Describe`] types.
///
/// ```
/// use route_contract::describe_object;
///
/// struct Person {
///     name: String,
///     age: Option<i64>,
/// }
///
/// describe_object!(Person => "Person" {
///     "name": String,
///     "age": Option<i64>,
/// });
/// ```
#[macro_export]
macro_rules! describe_object {
    ($ty:ty => $name:literal { $($field:literal : $fty:ty),* $(,)? }) => {
        impl $crate::schema::Describe for $ty {
            fn describe() -> $crate::schema::TypeDescriptor {
                $crate::schema::TypeDescriptor::Object($crate::schema::ObjectRef::deferred(
                    $name,
                    || vec![$($crate::schema::Field::of::<$fty>($field)),*],
                ))
            }
        }
    };
}
