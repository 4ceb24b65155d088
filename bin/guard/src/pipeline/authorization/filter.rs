use ahash::HashSet;

use crate::ast::operation::{FieldNode, RequestAst, SelectionNode};

/// Returns a copy of `ast` keeping only the fields accepted by `predicate`.
///
/// A rejected field takes its whole subtree with it. Composite fields and inline fragments
/// left without any selection are dropped as well, and variable definitions the remaining
/// selections no longer reference are removed. The input is left untouched.
pub fn filter<P>(ast: &RequestAst, predicate: P) -> RequestAst
where
    P: Fn(&FieldNode) -> bool,
{
    let selections = filter_selections(&ast.selections, &predicate);

    let mut used_variables = HashSet::default();
    for directive in &ast.directives {
        for (_, value) in &directive.arguments {
            value.collect_variables(&mut used_variables);
        }
    }
    collect_used_variables(&selections, &mut used_variables);

    let variable_definitions = ast
        .variable_definitions
        .iter()
        .filter(|definition| used_variables.contains(&definition.name))
        .cloned()
        .collect();

    RequestAst {
        kind: ast.kind,
        name: ast.name.clone(),
        root_type: ast.root_type.clone(),
        variable_definitions,
        directives: ast.directives.clone(),
        selections,
    }
}

fn filter_selections<P>(selections: &[SelectionNode], predicate: &P) -> Vec<SelectionNode>
where
    P: Fn(&FieldNode) -> bool,
{
    let mut retained = Vec::with_capacity(selections.len());

    for selection in selections {
        match selection {
            SelectionNode::Field(field) => {
                if !predicate(field) {
                    continue;
                }
                if field.is_leaf() {
                    retained.push(selection.clone());
                    continue;
                }

                let children = filter_selections(&field.children, predicate);
                if children.is_empty() {
                    continue;
                }
                retained.push(SelectionNode::Field(field.with_children(children)));
            }
            SelectionNode::InlineFragment(fragment) => {
                let children = filter_selections(&fragment.children, predicate);
                if !children.is_empty() {
                    retained.push(SelectionNode::InlineFragment(
                        fragment.with_children(children),
                    ));
                }
            }
        }
    }

    retained
}

fn collect_used_variables(selections: &[SelectionNode], used_variables: &mut HashSet<String>) {
    for selection in selections {
        match selection {
            SelectionNode::Field(field) => {
                for (_, value) in &field.arguments {
                    value.collect_variables(used_variables);
                }
                for directive in &field.directives {
                    for (_, value) in &directive.arguments {
                        value.collect_variables(used_variables);
                    }
                }
                collect_used_variables(&field.children, used_variables);
            }
            SelectionNode::InlineFragment(fragment) => {
                for directive in &fragment.directives {
                    for (_, value) in &directive.arguments {
                        value.collect_variables(used_variables);
                    }
                }
                collect_used_variables(&fragment.children, used_variables);
            }
        }
    }
}
