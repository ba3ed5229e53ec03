//! Lowering from tree-sitter CSTs to the frontend interface model.
//!
//! Every function-like node with a body becomes its own [`ast::Function`];
//! statement trees never contain nested functions. Expression shapes the
//! interface does not model become `Unknown`, keeping their embedded
//! call/allocation/await subexpressions in `parts` so those sites stay
//! visible to indexing.

use flowfact_ast as ast;
use flowfact_common::Span;
use tree_sitter::Node;

/// Function-like node kinds (JavaScript and TypeScript grammars).
const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "method_definition",
    "generator_function_declaration",
    "generator_function",
];

/// Nodes whose interiors belong to another function (or to no function)
/// and are never walked while lowering statements.
const OPAQUE_KINDS: &[&str] = &[
    "class_declaration",
    "class_expression",
    "class",
    "class_body",
    "abstract_class_declaration",
];

pub fn is_function_kind(kind: &str) -> bool {
    FUNCTION_KINDS.contains(&kind)
}

fn is_opaque_kind(kind: &str) -> bool {
    is_function_kind(kind) || OPAQUE_KINDS.contains(&kind)
}

/// Lower one parsed file: collect every function-like node with a body,
/// nested ones included, in pre-order.
pub fn lower_file(path: &str, source: &[u8], root: Node) -> ast::SourceFile {
    let mut functions = Vec::new();
    collect_functions(root, source, &mut functions);
    ast::SourceFile {
        path: path.to_string(),
        functions,
    }
}

fn collect_functions(node: Node, src: &[u8], out: &mut Vec<ast::Function>) {
    if is_function_kind(node.kind()) {
        if let Some(function) = lower_function(node, src) {
            out.push(function);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_functions(child, src, out);
    }
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_byte() as u32, node.end_byte() as u32)
}

fn text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn named_non_comment<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn has_optional_chain(node: Node) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor)
        .any(|c| c.kind() == "optional_chain");
    result
}

/// Peel parentheses and TypeScript-only wrappers off an expression.
fn strip(node: Node) -> Node {
    let mut current = node;
    loop {
        match current.kind() {
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" => match named_non_comment(current).first() {
                Some(inner) => current = *inner,
                None => return current,
            },
            "type_assertion" => match named_non_comment(current).last() {
                Some(inner) => current = *inner,
                None => return current,
            },
            _ => return current,
        }
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn lower_function(node: Node, src: &[u8]) -> Option<ast::Function> {
    let body_node = node.child_by_field_name("body")?;

    let kind = match node.kind() {
        "function_declaration" | "generator_function_declaration" => ast::FunctionKind::Declaration,
        "arrow_function" => ast::FunctionKind::Arrow,
        "method_definition" => ast::FunctionKind::Method,
        _ => ast::FunctionKind::Expression,
    };

    let body = if body_node.kind() == "statement_block" {
        ast::FunctionBody::Block(lower_block_body(body_node, src))
    } else {
        ast::FunctionBody::Expr(lower_expr(body_node, src))
    };

    Some(ast::Function {
        span: span_of(node),
        name: function_name(node, src),
        kind,
        params: lower_params(node, src),
        body,
    })
}

fn function_name(node: Node, src: &[u8]) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(text(name, src).to_string());
    }
    // Arrow functions and function expressions bound by a declarator or
    // assignment pick up the binding's name.
    let parent = node.parent()?;
    match parent.kind() {
        "variable_declarator" | "public_field_definition" => parent
            .child_by_field_name("name")
            .map(|n| text(n, src).to_string()),
        "assignment_expression" => parent
            .child_by_field_name("left")
            .filter(|l| l.kind() == "identifier")
            .map(|n| text(n, src).to_string()),
        "pair" => parent
            .child_by_field_name("key")
            .map(|n| text(n, src).to_string()),
        _ => None,
    }
}

fn lower_params(node: Node, src: &[u8]) -> Vec<ast::Param> {
    // Single-parameter arrows without parentheses use the `parameter`
    // field; everything else has a `formal_parameters` list.
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![lower_param(single, src, 0)];
    }
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_non_comment(params)
        .into_iter()
        .enumerate()
        .map(|(i, p)| lower_param(p, src, i))
        .collect()
}

fn lower_param(node: Node, src: &[u8], index: usize) -> ast::Param {
    let span = span_of(node);
    match node.kind() {
        "identifier" => ast::Param {
            name: text(node, src).to_string(),
            span,
        },
        // `x = default`
        "assignment_pattern" => node
            .child_by_field_name("left")
            .map(|l| lower_param(l, src, index))
            .unwrap_or(ast::Param {
                name: placeholder_param(index),
                span,
            }),
        // TS wrappers around the underlying pattern.
        "required_parameter" | "optional_parameter" => node
            .child_by_field_name("pattern")
            .map(|p| lower_param(p, src, index))
            .unwrap_or(ast::Param {
                name: placeholder_param(index),
                span,
            }),
        // Destructuring and rest patterns bind multiple (or renamed)
        // names; the coarse model keeps a positional placeholder.
        _ => ast::Param {
            name: placeholder_param(index),
            span,
        },
    }
}

/// Placeholder for unnamed positional parameters; `#` keeps it disjoint
/// from any real identifier.
fn placeholder_param(index: usize) -> String {
    format!("#arg{index}")
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn lower_block_body(block: Node, src: &[u8]) -> Vec<ast::Stmt> {
    named_non_comment(block)
        .into_iter()
        .flat_map(|s| lower_stmt_multi(s, src))
        .collect()
}

/// Lower a statement node; declarations expand to one `Decl` per
/// declarator so that every statement site has a unique span.
fn lower_stmt_multi(node: Node, src: &[u8]) -> Vec<ast::Stmt> {
    if matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
        let declarators: Vec<Node> = named_non_comment(node)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        let whole = span_of(node);
        return match declarators.as_slice() {
            [] => vec![ast::Stmt::Other {
                span: whole,
                exprs: Vec::new(),
                body: Vec::new(),
            }],
            [single] => vec![ast::Stmt::Decl {
                span: whole,
                declarator: lower_declarator(*single, src),
            }],
            many => many
                .iter()
                .map(|d| ast::Stmt::Decl {
                    span: span_of(*d),
                    declarator: lower_declarator(*d, src),
                })
                .collect(),
        };
    }
    vec![lower_stmt(node, src)]
}

fn lower_stmt(node: Node, src: &[u8]) -> ast::Stmt {
    let span = span_of(node);
    match node.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut stmts = lower_stmt_multi(node, src);
            if stmts.len() == 1 {
                stmts.remove(0)
            } else {
                // A declaration in single-statement position (loop init,
                // un-braced branch) with several declarators: wrap them.
                ast::Stmt::Other {
                    span,
                    exprs: Vec::new(),
                    body: stmts,
                }
            }
        }
        "expression_statement" => match named_non_comment(node).first() {
            Some(expr) => ast::Stmt::Expr {
                span,
                expr: lower_expr(*expr, src),
            },
            None => ast::Stmt::Other {
                span,
                exprs: Vec::new(),
                body: Vec::new(),
            },
        },
        "return_statement" => ast::Stmt::Return {
            span,
            value: named_non_comment(node)
                .first()
                .map(|v| lower_expr(*v, src)),
        },
        "statement_block" => ast::Stmt::Block {
            span,
            body: lower_block_body(node, src),
        },
        "if_statement" => {
            let cond = node
                .child_by_field_name("condition")
                .map(|c| lower_expr(c, src))
                .unwrap_or(ast::Expr::Unknown {
                    span,
                    parts: Vec::new(),
                });
            let then_branch = node
                .child_by_field_name("consequence")
                .map(|c| Box::new(lower_stmt(c, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Stmt::Block {
                        span,
                        body: Vec::new(),
                    })
                });
            let else_branch = node
                .child_by_field_name("alternative")
                .and_then(|alt| named_non_comment(alt).first().copied())
                .map(|s| Box::new(lower_stmt(s, src)));
            ast::Stmt::If {
                span,
                cond,
                then_branch,
                else_branch,
            }
        }
        "for_statement" => {
            let init = node
                .child_by_field_name("initializer")
                .filter(|i| i.kind() != "empty_statement")
                .map(|i| Box::new(lower_stmt(i, src)));
            let mut header = Vec::new();
            if let Some(cond) = node.child_by_field_name("condition") {
                // The grammar wraps the condition as an expression
                // statement inside the header.
                let cond = if cond.kind() == "expression_statement" {
                    named_non_comment(cond).first().copied()
                } else if cond.kind() == "empty_statement" {
                    None
                } else {
                    Some(cond)
                };
                if let Some(cond) = cond {
                    header.push(lower_expr(cond, src));
                }
            }
            if let Some(inc) = node.child_by_field_name("increment") {
                header.push(lower_expr(inc, src));
            }
            ast::Stmt::Loop {
                span,
                init,
                header,
                body: lower_loop_body(node, src, span),
            }
        }
        "for_in_statement" => {
            let init = node
                .child_by_field_name("left")
                .filter(|l| l.kind() == "identifier")
                .map(|l| {
                    Box::new(ast::Stmt::Decl {
                        span: span_of(l),
                        declarator: ast::Declarator {
                            name: text(l, src).to_string(),
                            span: span_of(l),
                            init: None,
                        },
                    })
                });
            let header = node
                .child_by_field_name("right")
                .map(|r| vec![lower_expr(r, src)])
                .unwrap_or_default();
            ast::Stmt::Loop {
                span,
                init,
                header,
                body: lower_loop_body(node, src, span),
            }
        }
        "while_statement" | "do_statement" => {
            let header = node
                .child_by_field_name("condition")
                .map(|c| vec![lower_expr(c, src)])
                .unwrap_or_default();
            ast::Stmt::Loop {
                span,
                init: None,
                header,
                body: lower_loop_body(node, src, span),
            }
        }
        "throw_statement" => ast::Stmt::Throw {
            span,
            value: named_non_comment(node)
                .first()
                .map(|v| lower_expr(*v, src))
                .unwrap_or(ast::Expr::Unknown {
                    span,
                    parts: Vec::new(),
                }),
        },
        "try_statement" => {
            let block = node
                .child_by_field_name("body")
                .map(|b| Box::new(lower_stmt(b, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Stmt::Block {
                        span,
                        body: Vec::new(),
                    })
                });
            // Catch parameters are not modeled; references to them
            // degrade to unknown rvalues downstream.
            let handler = node
                .child_by_field_name("handler")
                .and_then(|h| h.child_by_field_name("body"))
                .map(|b| Box::new(lower_stmt(b, src)));
            let finalizer = node
                .child_by_field_name("finalizer")
                .and_then(|f| named_non_comment(f).first().copied())
                .map(|b| Box::new(lower_stmt(b, src)));
            ast::Stmt::Try {
                span,
                block,
                handler,
                finalizer,
            }
        }
        _ => {
            let mut exprs = Vec::new();
            let mut body = Vec::new();
            collect_other(node, src, &mut exprs, &mut body);
            ast::Stmt::Other { span, exprs, body }
        }
    }
}

fn lower_loop_body(node: Node, src: &[u8], span: Span) -> Box<ast::Stmt> {
    node.child_by_field_name("body")
        .map(|b| Box::new(lower_stmt(b, src)))
        .unwrap_or_else(|| {
            Box::new(ast::Stmt::Block {
                span,
                body: Vec::new(),
            })
        })
}

fn lower_declarator(node: Node, src: &[u8]) -> ast::Declarator {
    let name_node = node.child_by_field_name("name");
    let name = match name_node {
        Some(n) if n.kind() == "identifier" => text(n, src).to_string(),
        // Destructuring declarator: positional placeholder, unique by span.
        Some(n) => format!("#pat{}", n.start_byte()),
        None => format!("#pat{}", node.start_byte()),
    };
    ast::Declarator {
        name,
        span: name_node.map(span_of).unwrap_or_else(|| span_of(node)),
        init: node
            .child_by_field_name("value")
            .map(|v| lower_expr(v, src)),
    }
}

/// Salvage pass for statement kinds the model does not name: keep nested
/// statements and expressions in source order, skipping function and
/// class interiors.
fn collect_other(node: Node, src: &[u8], exprs: &mut Vec<ast::Expr>, body: &mut Vec<ast::Stmt>) {
    for child in named_non_comment(node) {
        let kind = child.kind();
        if is_opaque_kind(kind) {
            continue;
        }
        if is_statement_kind(kind) {
            body.push(lower_stmt(child, src));
        } else if is_expression_kind(kind) {
            exprs.push(lower_expr(child, src));
        } else {
            collect_other(child, src, exprs, body);
        }
    }
}

fn is_statement_kind(kind: &str) -> bool {
    kind.ends_with("_statement")
        || matches!(
            kind,
            "statement_block" | "lexical_declaration" | "variable_declaration"
        )
}

fn is_expression_kind(kind: &str) -> bool {
    kind.ends_with("_expression")
        || matches!(
            kind,
            "identifier"
                | "this"
                | "string"
                | "template_string"
                | "number"
                | "true"
                | "false"
                | "null"
                | "undefined"
                | "object"
                | "array"
        )
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn lower_expr(node: Node, src: &[u8]) -> ast::Expr {
    let node = strip(node);
    let span = span_of(node);
    match node.kind() {
        "identifier" => {
            let name = text(node, src);
            if name == "undefined" {
                ast::Expr::Undefined { span }
            } else {
                ast::Expr::Ident {
                    span,
                    name: name.to_string(),
                }
            }
        }
        "undefined" => ast::Expr::Undefined { span },
        "this" => ast::Expr::This { span },
        "string" => ast::Expr::Lit {
            span,
            value: ast::Lit::Str {
                value: string_value(node, src),
            },
        },
        "number" => ast::Expr::Lit {
            span,
            value: ast::Lit::Num {
                value: number_value(text(node, src)),
            },
        },
        "true" => ast::Expr::Lit {
            span,
            value: ast::Lit::Bool { value: true },
        },
        "false" => ast::Expr::Lit {
            span,
            value: ast::Lit::Bool { value: false },
        },
        "null" => ast::Expr::Lit {
            span,
            value: ast::Lit::Null,
        },
        "member_expression" => {
            let object = node
                .child_by_field_name("object")
                .map(|o| Box::new(lower_expr(o, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            let property = node
                .child_by_field_name("property")
                .map(|p| ast::Property::Named {
                    name: text(p, src).to_string(),
                })
                .unwrap_or(ast::Property::Named {
                    name: String::new(),
                });
            ast::Expr::Member {
                span,
                object,
                property,
                optional: has_optional_chain(node),
            }
        }
        "subscript_expression" => {
            let object = node
                .child_by_field_name("object")
                .map(|o| Box::new(lower_expr(o, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            let key = node
                .child_by_field_name("index")
                .map(|i| Box::new(lower_expr(i, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            ast::Expr::Member {
                span,
                object,
                property: ast::Property::Computed { key },
                optional: has_optional_chain(node),
            }
        }
        "call_expression" => {
            let callee = node
                .child_by_field_name("function")
                .map(|f| Box::new(lower_expr(f, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            ast::Expr::Call {
                span,
                callee,
                args: lower_arguments(node, src),
                optional: has_optional_chain(node),
            }
        }
        "new_expression" => {
            let ctor = node
                .child_by_field_name("constructor")
                .map(|c| Box::new(lower_expr(c, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            ast::Expr::New {
                span,
                ctor,
                args: lower_arguments(node, src),
            }
        }
        "object" => ast::Expr::ObjectLit {
            span,
            values: named_non_comment(node)
                .into_iter()
                .filter_map(|p| lower_object_entry(p, src))
                .collect(),
        },
        "array" => ast::Expr::ArrayLit {
            span,
            values: named_non_comment(node)
                .into_iter()
                .map(|v| lower_expr(v, src))
                .collect(),
        },
        "await_expression" => {
            let value = named_non_comment(node)
                .first()
                .map(|v| Box::new(lower_expr(*v, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            ast::Expr::Await { span, value }
        }
        "assignment_expression" => {
            let target = node
                .child_by_field_name("left")
                .map(|l| Box::new(lower_expr(l, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            let value = node
                .child_by_field_name("right")
                .map(|r| Box::new(lower_expr(r, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            ast::Expr::Assign { span, target, value }
        }
        "augmented_assignment_expression" => {
            // `x += e` mutates x with an opaque value; keep e for its
            // embedded sites.
            let target = node
                .child_by_field_name("left")
                .map(|l| Box::new(lower_expr(l, src)))
                .unwrap_or_else(|| {
                    Box::new(ast::Expr::Unknown {
                        span,
                        parts: Vec::new(),
                    })
                });
            let parts = node
                .child_by_field_name("right")
                .map(|r| vec![lower_expr(r, src)])
                .unwrap_or_default();
            ast::Expr::Assign {
                span,
                target,
                value: Box::new(ast::Expr::Unknown { span, parts }),
            }
        }
        "ternary_expression" => {
            let field = |name: &str| {
                node.child_by_field_name(name)
                    .map(|n| Box::new(lower_expr(n, src)))
                    .unwrap_or_else(|| {
                        Box::new(ast::Expr::Unknown {
                            span,
                            parts: Vec::new(),
                        })
                    })
            };
            ast::Expr::Ternary {
                span,
                cond: field("condition"),
                then_value: field("consequence"),
                else_value: field("alternative"),
            }
        }
        "binary_expression" => {
            let op = node
                .child_by_field_name("operator")
                .map(|o| text(o, src).to_string())
                .unwrap_or_default();
            let field = |name: &str| {
                node.child_by_field_name(name)
                    .map(|n| Box::new(lower_expr(n, src)))
                    .unwrap_or_else(|| {
                        Box::new(ast::Expr::Unknown {
                            span,
                            parts: Vec::new(),
                        })
                    })
            };
            ast::Expr::Binary {
                span,
                op,
                lhs: field("left"),
                rhs: field("right"),
            }
        }
        "template_string" => ast::Expr::Template {
            span,
            parts: named_non_comment(node)
                .into_iter()
                .filter(|c| c.kind() == "template_substitution")
                .filter_map(|sub| named_non_comment(sub).first().map(|e| lower_expr(*e, src)))
                .collect(),
        },
        // Function-valued expressions become their own Function entries;
        // here they are opaque values.
        kind if is_opaque_kind(kind) => ast::Expr::Unknown {
            span,
            parts: Vec::new(),
        },
        // Everything else: opaque value, preserved subexpressions.
        _ => ast::Expr::Unknown {
            span,
            parts: named_non_comment(node)
                .into_iter()
                .filter(|c| !is_statement_kind(c.kind()))
                .map(|c| lower_expr(c, src))
                .collect(),
        },
    }
}

fn lower_arguments(node: Node, src: &[u8]) -> Vec<ast::Expr> {
    let Some(args) = node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    // Tagged templates pass the template as their only argument.
    if args.kind() == "template_string" {
        return vec![lower_expr(args, src)];
    }
    named_non_comment(args)
        .into_iter()
        .map(|a| lower_expr(a, src))
        .collect()
}

fn lower_object_entry(node: Node, src: &[u8]) -> Option<ast::Expr> {
    match node.kind() {
        "pair" => node.child_by_field_name("value").map(|v| lower_expr(v, src)),
        "shorthand_property_identifier" => Some(ast::Expr::Ident {
            span: span_of(node),
            name: text(node, src).to_string(),
        }),
        "spread_element" => named_non_comment(node)
            .first()
            .map(|e| lower_expr(*e, src)),
        // Methods are separate functions; computed keys are not values.
        _ => None,
    }
}

fn string_value(node: Node, src: &[u8]) -> String {
    named_non_comment(node)
        .into_iter()
        .map(|f| text(f, src))
        .collect()
}

fn number_value(raw: &str) -> f64 {
    raw.replace('_', "").parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{get_language, Language};
    use flowfact_ast::{Expr, FunctionBody, Lit, Property, Stmt};
    use tree_sitter::Parser;

    fn parse_js(source: &str) -> ast::SourceFile {
        let mut parser = Parser::new();
        parser.set_language(&get_language(Language::JavaScript)).unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_file("test.js", source.as_bytes(), tree.root_node())
    }

    fn parse_ts(source: &str) -> ast::SourceFile {
        let mut parser = Parser::new();
        parser.set_language(&get_language(Language::TypeScript)).unwrap();
        let tree = parser.parse(source, None).unwrap();
        lower_file("test.ts", source.as_bytes(), tree.root_node())
    }

    fn only_function(file: &ast::SourceFile) -> &ast::Function {
        assert_eq!(file.functions.len(), 1, "expected a single function");
        &file.functions[0]
    }

    #[test]
    fn test_function_declaration_shape() {
        let file = parse_js("function id(x) { return x; }");
        let f = only_function(&file);
        assert_eq!(f.name.as_deref(), Some("id"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].name, "x");
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        assert!(matches!(
            &body[0],
            Stmt::Return { value: Some(Expr::Ident { name, .. }), .. } if name == "x"
        ));
    }

    #[test]
    fn test_arrow_with_expression_body() {
        let file = parse_js("const double = (n) => n * 2;");
        let f = only_function(&file);
        assert_eq!(f.name.as_deref(), Some("double"));
        assert!(matches!(f.kind, ast::FunctionKind::Arrow));
        assert!(matches!(&f.body, FunctionBody::Expr(Expr::Binary { .. })));
    }

    #[test]
    fn test_optional_member_with_nullish_default() {
        let file = parse_js("function g(obj) { const v = obj?.value ?? \"d\"; return v; }");
        let f = only_function(&file);
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        let Stmt::Decl { declarator, .. } = &body[0] else {
            panic!("expected decl, got {:?}", body[0]);
        };
        let Some(Expr::Binary { op, lhs, .. }) = &declarator.init else {
            panic!("expected ?? binary init");
        };
        assert_eq!(op, "??");
        let Expr::Member {
            property, optional, ..
        } = lhs.as_ref()
        else {
            panic!("expected member lhs");
        };
        assert!(*optional);
        assert!(matches!(property, Property::Named { name } if name == "value"));
    }

    #[test]
    fn test_computed_member_is_dynamic_key() {
        let file = parse_js("function f(o, k, v) { o[k] = v; }");
        let f = only_function(&file);
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        let Stmt::Expr {
            expr: Expr::Assign { target, .. },
            ..
        } = &body[0]
        else {
            panic!("expected assignment statement");
        };
        let Expr::Member { property, .. } = target.as_ref() else {
            panic!("expected member target");
        };
        assert!(matches!(
            property,
            Property::Computed { key } if matches!(key.as_ref(), Expr::Ident { name, .. } if name == "k")
        ));
    }

    #[test]
    fn test_nested_functions_are_separate_entries() {
        let file = parse_js("function outer(a) { const inner = (b) => b; return inner(a); }");
        assert_eq!(file.functions.len(), 2);
        assert_eq!(file.functions[0].name.as_deref(), Some("outer"));
        assert_eq!(file.functions[1].name.as_deref(), Some("inner"));
    }

    #[test]
    fn test_ts_wrappers_are_stripped() {
        let file = parse_ts("function f(x: string): string { const y = (x as any)!; return y; }");
        let f = only_function(&file);
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        let Stmt::Decl { declarator, .. } = &body[0] else {
            panic!("expected decl");
        };
        assert!(matches!(
            declarator.init.as_ref().unwrap(),
            Expr::Ident { name, .. } if name == "x"
        ));
    }

    #[test]
    fn test_call_under_unary_survives_as_unknown_part() {
        let file = parse_js("function f(x) { const ok = !check(x); return ok; }");
        let f = only_function(&file);
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        let Stmt::Decl { declarator, .. } = &body[0] else {
            panic!("expected decl");
        };
        let Expr::Unknown { parts, .. } = declarator.init.as_ref().unwrap() else {
            panic!("expected unknown init, got {:?}", declarator.init);
        };
        assert!(matches!(&parts[0], Expr::Call { .. }));
    }

    #[test]
    fn test_string_and_number_literals() {
        let file = parse_js("function f() { const s = \"hi\"; const n = 1_000; }");
        let f = only_function(&file);
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        let Stmt::Decl { declarator, .. } = &body[0] else {
            panic!("expected decl");
        };
        assert!(matches!(
            declarator.init.as_ref().unwrap(),
            Expr::Lit { value: Lit::Str { value }, .. } if value == "hi"
        ));
        let Stmt::Decl { declarator, .. } = &body[1] else {
            panic!("expected decl");
        };
        assert!(matches!(
            declarator.init.as_ref().unwrap(),
            Expr::Lit { value: Lit::Num { value }, .. } if *value == 1000.0
        ));
    }
}
