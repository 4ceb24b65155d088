use std::sync::{Arc, LazyLock};

use ahash::HashMap;
use graphql_parser::schema::{self as parser, Definition, TypeDefinition, TypeExtension};
use tracing::trace;

use crate::ast::value::{Directive, TypeRef, Value};

/// A schema directive attached to a field or a type, reduced to what predicates look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    /// The value of the single string argument, the comma-joined items of a single list of
    /// strings, or the rendered argument list. `None` when the directive has no arguments.
    pub body: Option<String>,
}

impl From<&Directive> for Annotation {
    fn from(directive: &Directive) -> Self {
        let body = match directive.arguments.as_slice() {
            [] => None,
            [(_, Value::String(s))] => Some(s.clone()),
            [(_, Value::List(items))] if items.iter().all(|item| item.as_str().is_some()) => {
                Some(items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(","))
            }
            arguments => Some(
                arguments
                    .iter()
                    .map(|(name, value)| format!("{}:{}", name, value))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        };

        Annotation {
            name: directive.name.clone(),
            body,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMetadata {
    pub parent_type: Option<String>,
    pub output_type: Option<String>,
    pub is_list: bool,
    pub is_non_null: bool,
    /// Directives declared on the field definition.
    pub annotations: Vec<Annotation>,
    /// Directives declared on the field's output type.
    pub type_annotations: Vec<Annotation>,
}

static EMPTY_METADATA: LazyLock<Arc<FieldMetadata>> =
    LazyLock::new(|| Arc::new(FieldMetadata::default()));

impl FieldMetadata {
    /// Metadata of a field the schema does not describe (`__typename`, unknown fields).
    pub fn empty() -> Arc<FieldMetadata> {
        EMPTY_METADATA.clone()
    }

    /// Looks the annotation up on the field first, then on its output type.
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .chain(self.type_annotations.iter())
            .find(|annotation| annotation.name == name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to parse schema SDL: {0}")]
    ParseError(#[from] parser::ParseError),
    #[error("Schema does not define a query root type")]
    MissingQueryType,
}

/// The annotated schema. Built once, shared read-only by every request.
#[derive(Debug, Default)]
pub struct SchemaAst {
    query_type: String,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    fields: HashMap<String, HashMap<String, Arc<FieldMetadata>>>,
}

struct RawField {
    name: String,
    field_type: TypeRef,
    annotations: Vec<Annotation>,
}

#[derive(Default)]
struct RawType {
    annotations: Vec<Annotation>,
    fields: Vec<RawField>,
}

fn annotations_of(directives: &[parser::Directive<'_, String>]) -> Vec<Annotation> {
    directives
        .iter()
        .map(|directive| Annotation::from(&Directive::from(directive)))
        .collect()
}

fn raw_fields(fields: &[parser::Field<'_, String>]) -> Vec<RawField> {
    fields
        .iter()
        .map(|field| RawField {
            name: field.name.clone(),
            field_type: TypeRef::from(&field.field_type),
            annotations: annotations_of(&field.directives),
        })
        .collect()
}

impl SchemaAst {
    pub fn parse(sdl: &str) -> Result<SchemaAst, SchemaError> {
        let document = parser::parse_schema::<String>(sdl)?;

        let mut raw_types: HashMap<String, RawType> = HashMap::default();
        let mut query_type = None;
        let mut mutation_type = None;
        let mut subscription_type = None;

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema_def) => {
                    query_type = schema_def.query.clone();
                    mutation_type = schema_def.mutation.clone();
                    subscription_type = schema_def.subscription.clone();
                }
                Definition::TypeDefinition(type_def) => {
                    let (name, directives) = type_name_and_directives(type_def);
                    let entry = raw_types.entry(name.to_string()).or_default();
                    entry.annotations.extend(annotations_of(directives));
                    match type_def {
                        TypeDefinition::Object(object) => {
                            entry.fields.extend(raw_fields(&object.fields))
                        }
                        TypeDefinition::Interface(interface) => {
                            entry.fields.extend(raw_fields(&interface.fields))
                        }
                        _ => {}
                    }
                }
                Definition::TypeExtension(extension) => match extension {
                    TypeExtension::Object(object) => {
                        let entry = raw_types.entry(object.name.clone()).or_default();
                        entry.annotations.extend(annotations_of(&object.directives));
                        entry.fields.extend(raw_fields(&object.fields));
                    }
                    TypeExtension::Interface(interface) => {
                        let entry = raw_types.entry(interface.name.clone()).or_default();
                        entry.annotations.extend(annotations_of(&interface.directives));
                        entry.fields.extend(raw_fields(&interface.fields));
                    }
                    _ => {}
                },
                Definition::DirectiveDefinition(_) => {}
            }
        }

        let query_type = match query_type {
            Some(name) => name,
            None if raw_types.contains_key("Query") => "Query".to_string(),
            None => return Err(SchemaError::MissingQueryType),
        };
        let mutation_type =
            mutation_type.or_else(|| raw_types.contains_key("Mutation").then(|| "Mutation".into()));
        let subscription_type = subscription_type.or_else(|| {
            raw_types
                .contains_key("Subscription")
                .then(|| "Subscription".into())
        });

        let mut fields: HashMap<String, HashMap<String, Arc<FieldMetadata>>> = HashMap::default();
        for (type_name, raw_type) in &raw_types {
            let type_fields = fields.entry(type_name.clone()).or_default();
            for raw_field in &raw_type.fields {
                let output_type = raw_field.field_type.named_type();
                let type_annotations = raw_types
                    .get(output_type)
                    .map(|t| t.annotations.clone())
                    .unwrap_or_default();

                type_fields.insert(
                    raw_field.name.clone(),
                    Arc::new(FieldMetadata {
                        parent_type: Some(type_name.clone()),
                        output_type: Some(output_type.to_string()),
                        is_list: raw_field.field_type.is_list(),
                        is_non_null: raw_field.field_type.is_non_null(),
                        annotations: raw_field.annotations.clone(),
                        type_annotations,
                    }),
                );
            }
        }

        trace!(
            types = fields.len(),
            query_type = query_type.as_str(),
            "schema metadata built"
        );

        Ok(SchemaAst {
            query_type,
            mutation_type,
            subscription_type,
            fields,
        })
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_deref()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    pub fn field(&self, parent_type: &str, field_name: &str) -> Option<Arc<FieldMetadata>> {
        self.fields
            .get(parent_type)
            .and_then(|fields| fields.get(field_name))
            .cloned()
    }
}

fn type_name_and_directives<'d, 'a>(
    type_def: &'d TypeDefinition<'a, String>,
) -> (&'d str, &'d [parser::Directive<'a, String>]) {
    match type_def {
        TypeDefinition::Scalar(t) => (&t.name, &t.directives),
        TypeDefinition::Object(t) => (&t.name, &t.directives),
        TypeDefinition::Interface(t) => (&t.name, &t.directives),
        TypeDefinition::Union(t) => (&t.name, &t.directives),
        TypeDefinition::Enum(t) => (&t.name, &t.directives),
        TypeDefinition::InputObject(t) => (&t.name, &t.directives),
    }
}
