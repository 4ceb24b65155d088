use std::{cell::Cell, sync::Arc};

use ahash::HashMap;
use graphql_parser::query::{
    self as parser, Definition, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
    TypeCondition,
};
use tracing::trace;

use crate::ast::{
    operation::{FieldNode, InlineFragmentNode, OperationKind, RequestAst, SelectionNode},
    schema::{FieldMetadata, SchemaAst},
    value::{convert_arguments, Directive, VariableDefinition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Replace named fragment spreads with inline fragments carrying the fragment's
    /// selections. When disabled, a spread in the selected operation is an error.
    pub dereference_fragments: bool,
    /// Upper bound on the fields and inline fragments of the converted operation, counted
    /// after fragment spreads are expanded.
    pub max_selections: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            dereference_fragments: true,
            max_selections: 10_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(parser::ParseError),
    #[error("Document does not contain any operation")]
    NoOperation,
    #[error("Operation '{0}' is not defined in the document")]
    OperationNotFound(String),
    #[error("An operation name is required when the document contains multiple operations")]
    AmbiguousOperation,
    #[error("Unknown fragment '{0}'")]
    UnknownFragment(String),
    #[error("Fragment '{0}' spreads itself")]
    CyclicFragment(String),
    #[error("Fragment spread '...{0}' requires fragment de-referencing")]
    FragmentSpreadNotAllowed(String),
    #[error("Operation expands to more than {0} selections")]
    SelectionLimitExceeded(usize),
    #[error("Schema does not define a {0} root type")]
    MissingRootType(&'static str),
}

impl From<parser::ParseError> for ParseError {
    fn from(err: parser::ParseError) -> Self {
        ParseError::Syntax(err)
    }
}

/// Turns query text into a [`RequestAst`] resolved against the annotated schema.
pub trait QueryParser: Send + Sync {
    fn parse(
        &self,
        text: &str,
        operation_name: Option<&str>,
        schema: &SchemaAst,
        options: &ParseOptions,
    ) -> Result<RequestAst, ParseError>;
}

/// [`QueryParser`] backed by `graphql-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphQLQueryParser;

impl QueryParser for GraphQLQueryParser {
    fn parse(
        &self,
        text: &str,
        operation_name: Option<&str>,
        schema: &SchemaAst,
        options: &ParseOptions,
    ) -> Result<RequestAst, ParseError> {
        let document = parser::parse_query::<String>(text)?;

        let mut operations = Vec::new();
        let mut fragments: HashMap<&str, &FragmentDefinition<'_, String>> = HashMap::default();
        for definition in &document.definitions {
            match definition {
                Definition::Operation(operation) => operations.push(operation),
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
            }
        }

        let operation = select_operation(&operations, operation_name.filter(|n| !n.is_empty()))?;
        let header = OperationHeader::from(operation);

        let root_type = match header.kind {
            OperationKind::Query => schema.query_type(),
            OperationKind::Mutation => schema
                .mutation_type()
                .ok_or(ParseError::MissingRootType("mutation"))?,
            OperationKind::Subscription => schema
                .subscription_type()
                .ok_or(ParseError::MissingRootType("subscription"))?,
        };

        let converter = SelectionConverter {
            schema,
            fragments: &fragments,
            options,
            remaining: Cell::new(options.max_selections),
        };
        let mut visiting = Vec::new();
        let selections =
            converter.convert_selection_set(header.selection_set, Some(root_type), &mut visiting)?;

        trace!(
            operation_kind = header.kind.as_str(),
            operation_name = header.name.as_deref(),
            "operation parsed"
        );

        Ok(RequestAst {
            kind: header.kind,
            name: header.name,
            root_type: root_type.to_string(),
            variable_definitions: header.variable_definitions,
            directives: header.directives,
            selections,
        })
    }
}

fn operation_name_of<'d>(operation: &'d OperationDefinition<'_, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
    }
}

fn select_operation<'d, 'a>(
    operations: &[&'d OperationDefinition<'a, String>],
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition<'a, String>, ParseError> {
    match operation_name {
        Some(name) => operations
            .iter()
            .find(|operation| operation_name_of(operation) == Some(name))
            .copied()
            .ok_or_else(|| ParseError::OperationNotFound(name.to_string())),
        None => match operations {
            [] => Err(ParseError::NoOperation),
            [single] => Ok(*single),
            _ => Err(ParseError::AmbiguousOperation),
        },
    }
}

struct OperationHeader<'d, 'a> {
    kind: OperationKind,
    name: Option<String>,
    variable_definitions: Vec<VariableDefinition>,
    directives: Vec<Directive>,
    selection_set: &'d SelectionSet<'a, String>,
}

impl<'d, 'a> OperationHeader<'d, 'a> {
    fn new(
        kind: OperationKind,
        name: &Option<String>,
        variable_definitions: &'d [parser::VariableDefinition<'a, String>],
        directives: &'d [parser::Directive<'a, String>],
        selection_set: &'d SelectionSet<'a, String>,
    ) -> Self {
        OperationHeader {
            kind,
            name: name.clone(),
            variable_definitions: variable_definitions
                .iter()
                .map(VariableDefinition::from)
                .collect(),
            directives: directives.iter().map(Directive::from).collect(),
            selection_set,
        }
    }
}

impl<'d, 'a> From<&'d OperationDefinition<'a, String>> for OperationHeader<'d, 'a> {
    fn from(operation: &'d OperationDefinition<'a, String>) -> Self {
        match operation {
            OperationDefinition::SelectionSet(selection_set) => {
                OperationHeader::new(OperationKind::Query, &None, &[], &[], selection_set)
            }
            OperationDefinition::Query(q) => OperationHeader::new(
                OperationKind::Query,
                &q.name,
                &q.variable_definitions,
                &q.directives,
                &q.selection_set,
            ),
            OperationDefinition::Mutation(m) => OperationHeader::new(
                OperationKind::Mutation,
                &m.name,
                &m.variable_definitions,
                &m.directives,
                &m.selection_set,
            ),
            OperationDefinition::Subscription(s) => OperationHeader::new(
                OperationKind::Subscription,
                &s.name,
                &s.variable_definitions,
                &s.directives,
                &s.selection_set,
            ),
        }
    }
}

struct SelectionConverter<'s, 'd, 'a> {
    schema: &'s SchemaAst,
    fragments: &'s HashMap<&'d str, &'d FragmentDefinition<'a, String>>,
    options: &'s ParseOptions,
    remaining: Cell<usize>,
}

impl<'s, 'd, 'a> SelectionConverter<'s, 'd, 'a> {
    fn convert_selection_set(
        &self,
        selection_set: &'d SelectionSet<'a, String>,
        parent_type: Option<&str>,
        visiting: &mut Vec<&'d str>,
    ) -> Result<Vec<SelectionNode>, ParseError> {
        let mut nodes = Vec::with_capacity(selection_set.items.len());
        let mut expanded: Vec<&str> = Vec::new();

        for selection in &selection_set.items {
            let remaining = self.remaining.get();
            if remaining == 0 {
                return Err(ParseError::SelectionLimitExceeded(self.options.max_selections));
            }
            self.remaining.set(remaining - 1);

            let node = match selection {
                Selection::Field(field) => {
                    let metadata = parent_type
                        .and_then(|parent| self.schema.field(parent, &field.name))
                        .unwrap_or_else(FieldMetadata::empty);
                    let children = self.convert_selection_set(
                        &field.selection_set,
                        metadata.output_type.as_deref(),
                        visiting,
                    )?;

                    SelectionNode::Field(FieldNode {
                        name: field.name.clone(),
                        alias: field.alias.clone(),
                        arguments: convert_arguments(&field.arguments),
                        directives: field.directives.iter().map(Directive::from).collect(),
                        is_list: metadata.is_list,
                        metadata: Arc::clone(&metadata),
                        children,
                    })
                }
                Selection::InlineFragment(fragment) => {
                    let type_condition = fragment
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(name)| name.clone());
                    let children = self.convert_selection_set(
                        &fragment.selection_set,
                        type_condition.as_deref().or(parent_type),
                        visiting,
                    )?;

                    SelectionNode::InlineFragment(InlineFragmentNode {
                        type_condition,
                        directives: fragment.directives.iter().map(Directive::from).collect(),
                        children,
                    })
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    if !self.options.dereference_fragments {
                        return Err(ParseError::FragmentSpreadNotAllowed(name.to_string()));
                    }
                    let fragment = self
                        .fragments
                        .get(name)
                        .copied()
                        .ok_or_else(|| ParseError::UnknownFragment(name.to_string()))?;
                    if visiting.contains(&fragment.name.as_str()) {
                        return Err(ParseError::CyclicFragment(name.to_string()));
                    }
                    // Repeating a plain spread in the same selection set selects nothing new.
                    if spread.directives.is_empty() {
                        if expanded.contains(&name) {
                            continue;
                        }
                        expanded.push(name);
                    }

                    let TypeCondition::On(type_condition) = &fragment.type_condition;
                    visiting.push(fragment.name.as_str());
                    let children = self.convert_selection_set(
                        &fragment.selection_set,
                        Some(type_condition.as_str()),
                        visiting,
                    )?;
                    visiting.pop();

                    SelectionNode::InlineFragment(InlineFragmentNode {
                        type_condition: Some(type_condition.clone()),
                        directives: spread.directives.iter().map(Directive::from).collect(),
                        children,
                    })
                }
            };
            nodes.push(node);
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SDL: &str = r#"
        type Query {
            products(first: Int): [Product]
            me: User
        }
        type Mutation {
            rename(id: ID!, name: String!): Product
        }
        type Product {
            id: ID!
            name: String @authenticated
            owner: User
        }
        type User {
            email: String @authenticated
        }
    "#;

    fn parse(text: &str, operation_name: Option<&str>) -> Result<RequestAst, ParseError> {
        let schema = SchemaAst::parse(SDL).unwrap();
        GraphQLQueryParser.parse(text, operation_name, &schema, &ParseOptions::default())
    }

    fn field(node: &SelectionNode) -> &FieldNode {
        match node {
            SelectionNode::Field(field) => field,
            SelectionNode::InlineFragment(_) => panic!("expected a field"),
        }
    }

    #[test]
    fn resolves_fields_against_schema() {
        let ast = parse("{ products(first: 2) { id name owner { email } __typename } }", None)
            .unwrap();

        assert_eq!(ast.kind, OperationKind::Query);
        assert_eq!(ast.root_type, "Query");

        let products = field(&ast.selections[0]);
        assert!(products.is_list);
        assert_eq!(products.metadata.output_type.as_deref(), Some("Product"));

        let name = field(&products.children[1]);
        assert!(name.metadata.has_annotation("authenticated"));

        let email = field(&field(&products.children[2]).children[0]);
        assert!(email.metadata.has_annotation("authenticated"));

        let typename = field(&products.children[3]);
        assert_eq!(typename.metadata.output_type, None);
        assert!(typename.metadata.annotations.is_empty());
    }

    #[test]
    fn selects_operation_by_name() {
        let text = "query A { me { email } } mutation B { rename(id: 1, name: \"x\") { id } }";

        let ast = parse(text, Some("B")).unwrap();
        assert_eq!(ast.kind, OperationKind::Mutation);
        assert_eq!(ast.root_type, "Mutation");
        assert_eq!(ast.name.as_deref(), Some("B"));

        assert!(matches!(parse(text, None), Err(ParseError::AmbiguousOperation)));
        assert!(matches!(
            parse(text, Some("C")),
            Err(ParseError::OperationNotFound(name)) if name == "C"
        ));
    }

    #[test]
    fn dereferences_fragments_into_inline_fragments() {
        let ast = parse(
            "query { products { ...ProductFields } } fragment ProductFields on Product { id name }",
            None,
        )
        .unwrap();

        let products = field(&ast.selections[0]);
        let SelectionNode::InlineFragment(fragment) = &products.children[0] else {
            panic!("expected an inline fragment");
        };
        assert_eq!(fragment.type_condition.as_deref(), Some("Product"));
        assert!(field(&fragment.children[1])
            .metadata
            .has_annotation("authenticated"));
    }

    #[test]
    fn rejects_unknown_and_cyclic_fragments() {
        assert!(matches!(
            parse("{ products { ...Missing } }", None),
            Err(ParseError::UnknownFragment(name)) if name == "Missing"
        ));
        assert!(matches!(
            parse(
                "{ products { ...A } } fragment A on Product { ...B } fragment B on Product { ...A }",
                None
            ),
            Err(ParseError::CyclicFragment(_))
        ));
    }

    fn nested_fragments(levels: usize, selection: impl Fn(usize) -> String) -> String {
        let mut text = "{ products { ...F0 } }".to_string();
        for level in 0..levels {
            let next = if level + 1 == levels {
                "id".to_string()
            } else {
                selection(level + 1)
            };
            text.push_str(&format!(" fragment F{} on Product {{ {} }}", level, next));
        }
        text
    }

    #[test]
    fn expands_repeated_spreads_once() {
        let text = nested_fragments(40, |next| format!("...F{next} ...F{next}"));

        let ast = parse(&text, None).unwrap();

        let mut depth = 0;
        let mut children = &field(&ast.selections[0]).children;
        while let [SelectionNode::InlineFragment(fragment)] = children.as_slice() {
            depth += 1;
            children = &fragment.children;
        }
        assert_eq!(depth, 40);
        assert_eq!(field(&children[0]).name, "id");
    }

    #[test]
    fn rejects_operations_expanding_past_the_selection_limit() {
        let text = nested_fragments(30, |next| {
            format!("a: owner {{ ...F{next} }} b: owner {{ ...F{next} }}")
        });
        let schema = SchemaAst::parse(SDL).unwrap();

        let result = GraphQLQueryParser.parse(&text, None, &schema, &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::SelectionLimitExceeded(10_000))));

        let small = nested_fragments(3, |next| format!("...F{next}"));
        let result = GraphQLQueryParser.parse(
            &small,
            None,
            &schema,
            &ParseOptions {
                max_selections: 3,
                ..ParseOptions::default()
            },
        );
        assert!(matches!(result, Err(ParseError::SelectionLimitExceeded(3))));
    }

    #[test]
    fn keeps_spreads_out_when_dereferencing_is_disabled() {
        let schema = SchemaAst::parse(SDL).unwrap();
        let result = GraphQLQueryParser.parse(
            "{ products { ...F } } fragment F on Product { id }",
            None,
            &schema,
            &ParseOptions {
                dereference_fragments: false,
                ..ParseOptions::default()
            },
        );

        assert!(matches!(result, Err(ParseError::FragmentSpreadNotAllowed(_))));
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(matches!(parse("{ products { id }", None), Err(ParseError::Syntax(_))));
    }
}
