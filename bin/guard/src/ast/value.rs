use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter, Write},
};

use ahash::HashSet;
use graphql_parser::query as parser;

/// An owned GraphQL input value, detached from the parser's lifetimes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn collect_variables(&self, used_variables: &mut HashSet<String>) {
        match self {
            Value::Variable(name) => {
                used_variables.insert(name.clone());
            }
            Value::List(items) => {
                for item in items {
                    item.collect_variables(used_variables);
                }
            }
            Value::Object(fields) => {
                for value in fields.values() {
                    value.collect_variables(used_variables);
                }
            }
            Value::Int(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Boolean(_)
            | Value::Null
            | Value::Enum(_) => {}
        }
    }
}

impl From<&parser::Value<'_, String>> for Value {
    fn from(value: &parser::Value<'_, String>) -> Self {
        match value {
            parser::Value::Variable(name) => Value::Variable(name.clone()),
            // Integers outside of i64 are not valid GraphQL `Int`s either.
            parser::Value::Int(number) => Value::Int(number.as_i64().unwrap_or_default()),
            parser::Value::Float(float) => Value::Float(*float),
            parser::Value::String(s) => Value::String(s.clone()),
            parser::Value::Boolean(b) => Value::Boolean(*b),
            parser::Value::Null => Value::Null,
            parser::Value::Enum(e) => Value::Enum(e.clone()),
            parser::Value::List(items) => Value::List(items.iter().map(Value::from).collect()),
            parser::Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(float) => write!(f, "{:?}", float),
            Value::String(s) => write_quoted(f, s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Enum(e) => f.write_str(e),
            Value::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Value::Object(fields) => {
                f.write_char('{')?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}:{}", key, value)?;
                }
                f.write_char('}')
            }
        }
    }
}

fn write_quoted(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

pub(crate) fn write_arguments(f: &mut Formatter<'_>, arguments: &[(String, Value)]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (i, (name, value)) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write!(f, "{}:{}", name, value)?;
    }
    f.write_char(')')
}

pub(crate) fn convert_arguments(arguments: &[(String, parser::Value<'_, String>)]) -> Vec<(String, Value)> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, Value)>,
}

impl From<&parser::Directive<'_, String>> for Directive {
    fn from(directive: &parser::Directive<'_, String>) -> Self {
        Directive {
            name: directive.name.clone(),
            arguments: convert_arguments(&directive.arguments),
        }
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        write_arguments(f, &self.arguments)
    }
}

/// A (possibly wrapped) type reference, as used by variable definitions and field outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::Named(_) => false,
            TypeRef::List(_) => true,
            TypeRef::NonNull(inner) => inner.is_list(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }
}

impl From<&parser::Type<'_, String>> for TypeRef {
    fn from(ty: &parser::Type<'_, String>) -> Self {
        match ty {
            parser::Type::NamedType(name) => TypeRef::Named(name.clone()),
            parser::Type::ListType(inner) => TypeRef::List(Box::new(TypeRef::from(inner.as_ref()))),
            parser::Type::NonNullType(inner) => {
                TypeRef::NonNull(Box::new(TypeRef::from(inner.as_ref())))
            }
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: TypeRef,
    pub default_value: Option<Value>,
}

impl From<&parser::VariableDefinition<'_, String>> for VariableDefinition {
    fn from(definition: &parser::VariableDefinition<'_, String>) -> Self {
        VariableDefinition {
            name: definition.name.clone(),
            var_type: TypeRef::from(&definition.var_type),
            default_value: definition.default_value.as_ref().map(Value::from),
        }
    }
}

impl Display for VariableDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "${}:{}", self.name, self.var_type)?;
        if let Some(default_value) = &self.default_value {
            write!(f, "={}", default_value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_values_compactly() {
        let value = Value::Object(BTreeMap::from([
            ("first".to_string(), Value::Int(10)),
            (
                "tags".to_string(),
                Value::List(vec![Value::Enum("NEW".to_string()), Value::Null]),
            ),
            ("term".to_string(), Value::String("say \"hi\"\n".to_string())),
            ("ratio".to_string(), Value::Float(1.0)),
        ]));

        assert_eq!(
            value.to_string(),
            r#"{first:10,ratio:1.0,tags:[NEW,null],term:"say \"hi\"\n"}"#
        );
    }

    #[test]
    fn collects_nested_variables() {
        let value = Value::List(vec![
            Value::Variable("a".to_string()),
            Value::Object(BTreeMap::from([(
                "inner".to_string(),
                Value::Variable("b".to_string()),
            )])),
        ]);

        let mut used = HashSet::default();
        value.collect_variables(&mut used);

        assert_eq!(used.len(), 2);
        assert!(used.contains("a"));
        assert!(used.contains("b"));
    }

    #[test]
    fn renders_type_references() {
        let ty = TypeRef::NonNull(Box::new(TypeRef::List(Box::new(TypeRef::NonNull(
            Box::new(TypeRef::Named("ID".to_string())),
        )))));

        assert_eq!(ty.to_string(), "[ID!]!");
        assert!(ty.is_list());
        assert!(ty.is_non_null());
        assert_eq!(ty.named_type(), "ID");
    }
}
