use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::ast::{
    schema::FieldMetadata,
    value::{Directive, Value, VariableDefinition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

/// The selected operation of a request, with every field resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAst {
    pub kind: OperationKind,
    pub name: Option<String>,
    /// Schema type the top-level selections are resolved on.
    pub root_type: String,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selections: Vec<SelectionNode>,
}

impl RequestAst {
    /// `true` when the operation no longer selects any field.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionNode {
    Field(FieldNode),
    InlineFragment(InlineFragmentNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, Value)>,
    pub directives: Vec<Directive>,
    /// Schema metadata of the field; empty for fields the schema does not describe.
    pub metadata: Arc<FieldMetadata>,
    pub children: Vec<SelectionNode>,
    /// The field resolves to a list, so the response holds an array at its key.
    pub is_list: bool,
}

impl FieldNode {
    /// The key under which the field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn with_children(&self, children: Vec<SelectionNode>) -> FieldNode {
        FieldNode {
            name: self.name.clone(),
            alias: self.alias.clone(),
            arguments: self.arguments.clone(),
            directives: self.directives.clone(),
            metadata: self.metadata.clone(),
            children,
            is_list: self.is_list,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragmentNode {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub children: Vec<SelectionNode>,
}

impl InlineFragmentNode {
    pub fn with_children(&self, children: Vec<SelectionNode>) -> InlineFragmentNode {
        InlineFragmentNode {
            type_condition: self.type_condition.clone(),
            directives: self.directives.clone(),
            children,
        }
    }
}

pub(crate) const TYPE_DISAMBIGUATOR: char = ':';

/// A dotted location of a field in the response tree, such as `products.name`.
///
/// Segments of fields selected inside a typed inline fragment carry the type condition
/// after a `:` (`node.name:User`), which keeps otherwise equal paths of different
/// types apart. The suffix is never part of a response key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub property: String,
}

impl FieldPath {
    pub fn new(property: impl Into<String>) -> Self {
        FieldPath {
            property: property.into(),
        }
    }

    /// Response keys along the path, without type disambiguators.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.property.split('.').map(|segment| {
            segment
                .split_once(TYPE_DISAMBIGUATOR)
                .map_or(segment, |(key, _)| key)
        })
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.property)
    }
}

impl From<&str> for FieldPath {
    fn from(property: &str) -> Self {
        FieldPath::new(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_type_disambiguators_from_keys() {
        let path = FieldPath::new("search.title:Book.author");

        assert_eq!(path.keys().collect::<Vec<_>>(), vec!["search", "title", "author"]);
        assert_eq!(path.to_string(), "search.title:Book.author");
    }

    #[test]
    fn serializes_as_property_object() {
        let path = FieldPath::new("products.name");

        assert_eq!(
            serde_json::to_string(&path).unwrap(),
            r#"{"property":"products.name"}"#
        );
    }
}
