//! Field types of a message, traced through its `Deserialize` impl.
//!
//! HTTP parameters arrive as text and bind onto JSON before the typed request
//! exists. A blank request shows the type of most fields, but not of an empty
//! `Vec<i64>` or a `None` option; the traced [`Shape`] does.
//!
//! # Design Decisions
//! - Tracing drives `T::deserialize` with a deserializer that answers every
//!   request with a zero value and records what was asked for
//! - Options and sequences recurse at most [`MAX_DEPTH`] levels, which bounds
//!   self-referential messages
//! - A failed trace keeps whatever it recorded before the failure

use serde::de::value::{Error, StrDeserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde_json::{Map, Number, Value};

/// Nesting limit for options and sequences while tracing.
pub const MAX_DEPTH: usize = 16;

static UNKNOWN: Shape = Shape::Unknown;

/// What a message field holds, as far as parameter binding cares.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Bool,
    Integer,
    Float,
    String,
    Optional(Box<Shape>),
    Repeated(Box<Shape>),
    Message(Vec<(String, Shape)>),
    /// Maps, unit values, `serde_json::Value` and anything the trace did not reach.
    Unknown,
}

impl Shape {
    /// Trace the shape of `T`.
    pub fn of<T: DeserializeOwned>() -> Shape {
        let mut shape = Shape::Unknown;
        if let Err(e) = T::deserialize(Tracer { out: &mut shape, depth: 0 }) {
            tracing::debug!(
                ty = std::any::type_name::<T>(),
                error = %e,
                "Shape trace stopped early"
            );
        }
        shape
    }

    /// Best effort shape read off a JSON value. Empty arrays and nulls stay unknown.
    pub fn from_value(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Unknown,
            Value::Bool(_) => Shape::Bool,
            Value::Number(n) if n.is_f64() => Shape::Float,
            Value::Number(_) => Shape::Integer,
            Value::String(_) => Shape::String,
            Value::Array(items) => Shape::Repeated(Box::new(
                items.first().map(Shape::from_value).unwrap_or(Shape::Unknown),
            )),
            Value::Object(fields) => Shape::Message(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Shape::from_value(value)))
                    .collect(),
            ),
        }
    }

    /// The shape with any `Optional` wrappers removed.
    pub fn unwrapped(&self) -> &Shape {
        match self {
            Shape::Optional(inner) => inner.unwrapped(),
            shape => shape,
        }
    }

    /// A shared unknown shape.
    pub fn unknown() -> &'static Shape {
        &UNKNOWN
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.unwrapped(), Shape::Unknown)
    }

    /// Shape of field `name`, when this is a message that declares it.
    pub fn field(&self, name: &str) -> Option<&Shape> {
        match self.unwrapped() {
            Shape::Message(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, s)| s),
            _ => None,
        }
    }

    /// Shape found by following dotted `segments`; unknown once the path leaves the trace.
    pub fn at<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> &Shape {
        let mut shape = self;
        for segment in segments {
            shape = match shape.field(segment) {
                Some(field) => field,
                None => return &UNKNOWN,
            };
        }
        shape
    }

    /// JSON a freshly created value of this shape starts from.
    pub fn zero(&self) -> Value {
        match self {
            Shape::Bool => Value::Bool(false),
            Shape::Integer => Value::from(0),
            Shape::Float => Number::from_f64(0.0).map(Value::Number).unwrap_or(Value::Null),
            Shape::String => Value::String(String::new()),
            Shape::Optional(_) | Shape::Unknown => Value::Null,
            Shape::Repeated(_) => Value::Array(Vec::new()),
            Shape::Message(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, shape)| (name.clone(), shape.zero()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

struct Tracer<'a> {
    out: &'a mut Shape,
    depth: usize,
}

impl<'a> Tracer<'a> {
    fn record(self, shape: Shape) {
        *self.out = shape;
    }
}

macro_rules! trace_scalar {
    ($($method:ident => $shape:ident, $visit:ident($zero:expr);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
                self.record(Shape::$shape);
                visitor.$visit($zero)
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for Tracer<'a> {
    type Error = Error;

    trace_scalar! {
        deserialize_bool => Bool, visit_bool(false);
        deserialize_i8 => Integer, visit_i64(0);
        deserialize_i16 => Integer, visit_i64(0);
        deserialize_i32 => Integer, visit_i64(0);
        deserialize_i64 => Integer, visit_i64(0);
        deserialize_i128 => Integer, visit_i64(0);
        deserialize_u8 => Integer, visit_u64(0);
        deserialize_u16 => Integer, visit_u64(0);
        deserialize_u32 => Integer, visit_u64(0);
        deserialize_u64 => Integer, visit_u64(0);
        deserialize_u128 => Integer, visit_u64(0);
        deserialize_f32 => Float, visit_f64(0.0);
        deserialize_f64 => Float, visit_f64(0.0);
        deserialize_char => String, visit_char('\0');
        deserialize_str => String, visit_str("");
        deserialize_string => String, visit_str("");
        deserialize_bytes => String, visit_bytes(&[]);
        deserialize_byte_buf => String, visit_bytes(&[]);
        deserialize_identifier => String, visit_str("");
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.record(Shape::Unknown);
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.record(Shape::Unknown);
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.depth >= MAX_DEPTH {
            self.record(Shape::Optional(Box::new(Shape::Unknown)));
            return visitor.visit_none();
        }
        let mut inner = Shape::Unknown;
        let value = visitor.visit_some(Tracer {
            out: &mut inner,
            depth: self.depth + 1,
        });
        self.record(Shape::Optional(Box::new(inner)));
        value
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let mut element = Shape::Unknown;
        let value = visitor.visit_seq(Elements {
            remaining: usize::from(self.depth < MAX_DEPTH),
            first: Some(&mut element),
            depth: self.depth,
        });
        self.record(Shape::Repeated(Box::new(element)));
        value
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth;
        self.record(Shape::Unknown);
        visitor.visit_seq(Elements {
            remaining: len,
            first: None,
            depth,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let depth = self.depth;
        self.record(Shape::Unknown);
        visitor.visit_map(Fields::new(&[], depth))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        if self.depth >= 2 * MAX_DEPTH {
            return Err(de::Error::custom("message nesting too deep"));
        }
        let mut access = Fields::new(fields, self.depth);
        let value = visitor.visit_map(&mut access);
        self.record(Shape::Message(access.traced));
        value
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        // Unit variants bind from their name.
        let depth = self.depth;
        self.record(Shape::String);
        match variants.first() {
            Some(name) => visitor.visit_enum(Variant { name, depth }),
            None => Err(de::Error::custom("enum without variants")),
        }
    }
}

struct Elements<'a> {
    remaining: usize,
    first: Option<&'a mut Shape>,
    depth: usize,
}

impl<'de, 'a> SeqAccess<'de> for Elements<'a> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let mut scratch = Shape::Unknown;
        let out = match self.first.take() {
            Some(out) => out,
            None => &mut scratch,
        };
        seed.deserialize(Tracer {
            out,
            depth: self.depth + 1,
        })
        .map(Some)
    }
}

struct Fields {
    names: &'static [&'static str],
    next: usize,
    traced: Vec<(String, Shape)>,
    depth: usize,
}

impl Fields {
    fn new(names: &'static [&'static str], depth: usize) -> Self {
        Self {
            names,
            next: 0,
            traced: Vec::with_capacity(names.len()),
            depth,
        }
    }
}

impl<'de> MapAccess<'de> for Fields {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Error> {
        let Some(name) = self.names.get(self.next).copied() else {
            return Ok(None);
        };
        let key: StrDeserializer<'static, Error> = name.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Error> {
        let name = self.names.get(self.next).copied().unwrap_or_default();
        self.next += 1;
        let mut shape = Shape::Unknown;
        let value = seed.deserialize(Tracer {
            out: &mut shape,
            depth: self.depth + 1,
        });
        self.traced.push((name.to_string(), shape));
        value
    }
}

struct Variant {
    name: &'static str,
    depth: usize,
}

impl<'de> EnumAccess<'de> for Variant {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self), Error> {
        let key: StrDeserializer<'static, Error> = self.name.into_deserializer();
        let value = seed.deserialize(key)?;
        Ok((value, self))
    }
}

impl<'de> VariantAccess<'de> for Variant {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, Error> {
        let mut scratch = Shape::Unknown;
        seed.deserialize(Tracer {
            out: &mut scratch,
            depth: self.depth + 1,
        })
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_seq(Elements {
            remaining: len,
            first: None,
            depth: self.depth,
        })
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_map(Fields::new(fields, self.depth))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::context::UploadRef;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        label: String,
        weight: f64,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    enum Color {
        Red,
        Green,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct UserId(u64);

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Typed {
        ids: Vec<i64>,
        flag: Option<bool>,
        limit: Option<i64>,
        owner: UserId,
        color: Color,
        inner: Option<Inner>,
        labels: HashMap<String, String>,
        avatar: UploadRef,
        #[serde(rename = "displayName")]
        display_name: String,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Tree {
        name: String,
        children: Vec<Tree>,
        parent: Option<Box<Tree>>,
    }

    #[test]
    fn traces_repeated_optional_and_nested_fields() {
        let shape = Shape::of::<Typed>();

        assert_eq!(shape.field("ids"), Some(&Shape::Repeated(Box::new(Shape::Integer))));
        assert_eq!(shape.field("flag"), Some(&Shape::Optional(Box::new(Shape::Bool))));
        assert_eq!(shape.field("limit").map(Shape::unwrapped), Some(&Shape::Integer));
        assert_eq!(shape.field("owner"), Some(&Shape::Integer));
        assert_eq!(shape.field("color"), Some(&Shape::String));
        assert_eq!(shape.field("labels"), Some(&Shape::Unknown));
        assert_eq!(shape.field("displayName"), Some(&Shape::String));
        assert_eq!(shape.at(["inner", "weight"]), &Shape::Float);
        assert_eq!(shape.at(["avatar", "index"]), &Shape::Integer);
        assert!(shape.at(["inner", "missing"]).is_unknown());
    }

    #[test]
    fn recursive_messages_terminate() {
        let shape = Shape::of::<Tree>();
        assert_eq!(shape.at(["parent", "parent", "name"]), &Shape::String);
        assert!(matches!(shape.field("children"), Some(Shape::Repeated(_))));
    }

    #[test]
    fn zero_values_follow_the_shape() {
        let shape = Shape::of::<Inner>();
        assert_eq!(shape.zero(), json!({"label": "", "weight": 0.0}));
        assert_eq!(Shape::Optional(Box::new(Shape::Bool)).zero(), Value::Null);
        assert_eq!(Shape::Repeated(Box::new(Shape::Integer)).zero(), json!([]));
    }

    #[test]
    fn shape_from_blank_json() {
        let shape = Shape::from_value(&json!({"n": 0, "x": 0.5, "tags": [], "opt": null}));
        assert_eq!(shape.field("n"), Some(&Shape::Integer));
        assert_eq!(shape.field("x"), Some(&Shape::Float));
        assert_eq!(shape.field("tags"), Some(&Shape::Repeated(Box::new(Shape::Unknown))));
        assert!(shape.field("opt").is_some_and(Shape::is_unknown));
    }
}
