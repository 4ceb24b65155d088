use indexmap::IndexSet;

use crate::ast::operation::{FieldNode, FieldPath, RequestAst, SelectionNode, TYPE_DISAMBIGUATOR};

/// Collects the paths of all fields accepted by `predicate`, in document order.
///
/// Every field is visited. A composite field matching the predicate does not stop the walk,
/// its descendants are checked on their own. A path selected more than once (for example
/// through two fragments) is reported once, at its first occurrence.
pub fn property_paths<P>(ast: &RequestAst, predicate: P) -> Vec<FieldPath>
where
    P: Fn(&FieldNode) -> bool,
{
    let mut collector = PathCollector {
        predicate: &predicate,
        paths: IndexSet::new(),
    };
    collector.walk(&ast.selections, "", Some(ast.root_type.as_str()), None);

    collector.paths.into_iter().map(FieldPath::new).collect()
}

struct PathCollector<'p, P> {
    predicate: &'p P,
    paths: IndexSet<String>,
}

impl<P> PathCollector<'_, P>
where
    P: Fn(&FieldNode) -> bool,
{
    fn walk(
        &mut self,
        selections: &[SelectionNode],
        prefix: &str,
        parent_type: Option<&str>,
        fragment_type: Option<&str>,
    ) {
        for selection in selections {
            match selection {
                SelectionNode::Field(field) => {
                    let property = build_property(prefix, field.response_key(), fragment_type);
                    if (self.predicate)(field) {
                        self.paths.insert(property.clone());
                    }
                    if !field.is_leaf() {
                        self.walk(
                            &field.children,
                            &property,
                            field.metadata.output_type.as_deref(),
                            None,
                        );
                    }
                }
                SelectionNode::InlineFragment(fragment) => {
                    // Fragments on the enclosing type itself need no disambiguation.
                    let fragment_type = match fragment.type_condition.as_deref() {
                        Some(type_condition) if Some(type_condition) != parent_type => {
                            Some(type_condition)
                        }
                        _ => fragment_type,
                    };
                    self.walk(&fragment.children, prefix, parent_type, fragment_type);
                }
            }
        }
    }
}

fn build_property(prefix: &str, response_key: &str, fragment_type: Option<&str>) -> String {
    let mut property = String::with_capacity(prefix.len() + response_key.len() + 1);
    if !prefix.is_empty() {
        property.push_str(prefix);
        property.push('.');
    }
    property.push_str(response_key);
    if let Some(type_condition) = fragment_type {
        property.push(TYPE_DISAMBIGUATOR);
        property.push_str(type_condition);
    }
    property
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        parser::{GraphQLQueryParser, ParseOptions, QueryParser},
        schema::SchemaAst,
    };

    static SDL: &str = r#"
        type Query {
            products: [Product]
            search(term: String): [SearchResult]
        }
        union SearchResult = Product | Article
        type Product {
            id: ID!
            name: String @authenticated
            reviews: [Review] @authenticated
        }
        type Review {
            body: String @authenticated
            score: Int
        }
        type Article {
            title: String
            name: String @authenticated
        }
    "#;

    fn collect(query: &str) -> Vec<String> {
        let schema = SchemaAst::parse(SDL).unwrap();
        let ast = GraphQLQueryParser
            .parse(query, None, &schema, &ParseOptions::default())
            .unwrap();

        property_paths(&ast, |field| field.metadata.has_annotation("authenticated"))
            .into_iter()
            .map(|path| path.property)
            .collect()
    }

    #[test]
    fn collects_in_document_order() {
        let paths = collect("{ products { name id reviews { score body } } }");

        assert_eq!(
            paths,
            vec!["products.name", "products.reviews", "products.reviews.body"]
        );
    }

    #[test]
    fn uses_aliases_as_segments() {
        let paths = collect("{ items: products { title: name } }");

        assert_eq!(paths, vec!["items.title"]);
    }

    #[test]
    fn returns_nothing_when_no_field_matches() {
        let paths = collect("{ products { id reviews_count: __typename } }");

        assert!(paths.is_empty());
    }

    #[test]
    fn disambiguates_fields_of_type_conditions() {
        let paths = collect(
            "{ search(term: \"x\") { ... on Product { name } ... on Article { title name } } }",
        );

        assert_eq!(paths, vec!["search.name:Product", "search.name:Article"]);
    }

    #[test]
    fn reports_repeated_paths_once() {
        let paths = collect(
            "{ products { name ...Named ... on Product { name } } } fragment Named on Product { name }",
        );

        assert_eq!(paths, vec!["products.name"]);
    }
}
