use std::fmt::{self, Display, Formatter, Write};

use crate::ast::{
    operation::{FieldNode, InlineFragmentNode, OperationKind, RequestAst, SelectionNode},
    value::write_arguments,
};

/// Turns a (possibly filtered) [`RequestAst`] back into query text.
pub trait QueryRenderer: Send + Sync {
    fn render(&self, ast: &RequestAst) -> String;
}

/// Renders the shortest equivalent text, e.g. `{products{id name}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactQueryRenderer;

impl QueryRenderer for CompactQueryRenderer {
    fn render(&self, ast: &RequestAst) -> String {
        ast.to_string()
    }
}

fn write_selections(f: &mut Formatter<'_>, selections: &[SelectionNode]) -> fmt::Result {
    f.write_char('{')?;
    for (i, selection) in selections.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write!(f, "{}", selection)?;
    }
    f.write_char('}')
}

impl Display for RequestAst {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let is_shorthand = self.kind == OperationKind::Query
            && self.name.is_none()
            && self.variable_definitions.is_empty()
            && self.directives.is_empty();

        if !is_shorthand {
            f.write_str(self.kind.as_str())?;
            if let Some(name) = &self.name {
                write!(f, " {}", name)?;
            }
            if !self.variable_definitions.is_empty() {
                f.write_char('(')?;
                for (i, definition) in self.variable_definitions.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", definition)?;
                }
                f.write_char(')')?;
            }
            for directive in &self.directives {
                write!(f, "{}", directive)?;
            }
        }

        write_selections(f, &self.selections)
    }
}

impl Display for SelectionNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectionNode::Field(field) => write!(f, "{}", field),
            SelectionNode::InlineFragment(fragment) => write!(f, "{}", fragment),
        }
    }
}

impl Display for FieldNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}:", alias)?;
        }
        f.write_str(&self.name)?;
        write_arguments(f, &self.arguments)?;
        for directive in &self.directives {
            write!(f, "{}", directive)?;
        }
        if !self.children.is_empty() {
            write_selections(f, &self.children)?;
        }
        Ok(())
    }
}

impl Display for InlineFragmentNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("...")?;
        if let Some(type_condition) = &self.type_condition {
            write!(f, "on {}", type_condition)?;
        }
        for directive in &self.directives {
            write!(f, "{}", directive)?;
        }
        write_selections(f, &self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        parser::{GraphQLQueryParser, ParseOptions, QueryParser},
        schema::SchemaAst,
    };

    fn render(text: &str) -> String {
        let schema = SchemaAst::parse(
            r#"
            type Query { products(first: Int, filter: ProductFilter): [Product] node(id: ID!): Node }
            type Mutation { rename(id: ID!, name: String!): Product }
            interface Node { id: ID! }
            type Product implements Node { id: ID! name: String tags: [String] }
            input ProductFilter { term: String }
            "#,
        )
        .unwrap();
        let ast = GraphQLQueryParser
            .parse(text, None, &schema, &ParseOptions::default())
            .unwrap();

        CompactQueryRenderer.render(&ast)
    }

    #[test]
    fn renders_shorthand_queries() {
        insta::assert_snapshot!(
            render("query { products { id name } }"),
            @"{products{id name}}"
        );
    }

    #[test]
    fn renders_operation_header() {
        insta::assert_snapshot!(
            render(r#"query Products($first: Int = 10, $term: String) @cached { list: products(first: $first, filter: { term: $term }) { id } }"#),
            @"query Products($first:Int=10,$term:String)@cached{list:products(first:$first,filter:{term:$term}){id}}"
        );
    }

    #[test]
    fn renders_fragments_and_directives() {
        insta::assert_snapshot!(
            render(r#"query($skip: Boolean!) { node(id: "1") { id ... on Product @skip(if: $skip) { name } ...Tags } } fragment Tags on Product { tags }"#),
            @r#"query($skip:Boolean!){node(id:"1"){id ...on Product@skip(if:$skip){name} ...on Product{tags}}}"#
        );
    }

    #[test]
    fn renders_mutations() {
        insta::assert_snapshot!(
            render(r#"mutation { rename(id: 1, name: "new") { id } }"#),
            @r#"mutation{rename(id:1,name:"new"){id}}"#
        );
    }
}
