//! The frontend interface: function and statement syntax trees with
//! byte-offset spans.
//!
//! The core pipeline consumes this model and nothing else; any frontend
//! that can produce it (the bundled tree-sitter one, or an external tool
//! via `--program`) can drive an analysis. The model is deliberately
//! shallow: it keeps only the shapes the IR lowering table consumes, and
//! everything else arrives as [`Expr::Unknown`] with a span.
//!
//! Nested function-like nodes do not appear inside statement trees; each
//! function with a body is its own [`Function`] entry in the file list,
//! and the expression position it occupied lowers to `Unknown`.

pub mod load;

use flowfact_common::Span;
use serde::{Deserialize, Serialize};

pub use load::load_program;

/// Schema version of the program interchange format.
pub const PROGRAM_SCHEMA_VERSION: u32 = 1;

/// A whole parsed program: every source file the frontend produced,
/// canonically sorted by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Program {
    pub schema_version: u32,
    pub files: Vec<SourceFile>,
}

/// One source file: repo-relative `/`-separated path plus every
/// function-like node (including nested ones) found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceFile {
    pub path: String,
    pub functions: Vec<Function>,
}

/// What kind of function-like node produced a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Declaration,
    Expression,
    Arrow,
    Method,
}

/// A function-like node with a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Function {
    /// Byte span of the whole function-like node.
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: FunctionKind,
    /// Parameter names in declaration order. Destructuring and rest
    /// patterns arrive as positional placeholder names chosen by the
    /// frontend.
    pub params: Vec<Param>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Param {
    pub name: String,
    pub span: Span,
}

/// A block body, or the bare expression of an expression-bodied arrow
/// (which models an implicit return).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

/// One `const`/`let`/`var` declarator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Declarator {
    pub name: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<Expr>,
}

/// Statement nodes. Every variant except `Block` is a statement site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Stmt {
    /// A `const`/`let`/`var` declaration. Multi-declarator statements are
    /// split by the frontend, one `Decl` per declarator, each spanning its
    /// own declarator so statement anchors stay unique.
    Decl { span: Span, declarator: Declarator },
    /// An expression statement.
    Expr { span: Span, expr: Expr },
    /// `return` with an optional value.
    Return {
        span: Span,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    /// A plain `{ ... }` block. Not a statement site.
    Block { span: Span, body: Vec<Stmt> },
    /// `if`/`else`.
    If {
        span: Span,
        cond: Expr,
        then_branch: Box<Stmt>,
        #[serde(skip_serializing_if = "Option::is_none")]
        else_branch: Option<Box<Stmt>>,
    },
    /// Any loop form. Header expressions are kept in source order; `for`
    /// initializer declarations arrive as `init`.
    Loop {
        span: Span,
        #[serde(skip_serializing_if = "Option::is_none")]
        init: Option<Box<Stmt>>,
        header: Vec<Expr>,
        body: Box<Stmt>,
    },
    /// `throw`.
    Throw { span: Span, value: Expr },
    /// `try`/`catch`/`finally`.
    Try {
        span: Span,
        block: Box<Stmt>,
        #[serde(skip_serializing_if = "Option::is_none")]
        handler: Option<Box<Stmt>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        finalizer: Option<Box<Stmt>>,
    },
    /// Any other statement shape (switch, labeled, ...): its embedded
    /// expressions and statements, order-preserving.
    Other {
        span: Span,
        exprs: Vec<Expr>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Loop { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Other { span, .. } => *span,
        }
    }
}

/// Literal values the IR cares to distinguish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Lit {
    Str { value: String },
    Num { value: f64 },
    Bool { value: bool },
    Null,
}

/// Member-access property: a fixed name or a computed key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Property {
    Named { name: String },
    Computed { key: Box<Expr> },
}

/// Expression nodes, pre-stripped of parentheses, TS type annotations,
/// `as`/`satisfies` casts and non-null assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Expr {
    Ident { span: Span, name: String },
    This { span: Span },
    Lit { span: Span, value: Lit },
    Undefined { span: Span },
    Member {
        span: Span,
        object: Box<Expr>,
        property: Property,
        optional: bool,
    },
    Call {
        span: Span,
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        span: Span,
        ctor: Box<Expr>,
        args: Vec<Expr>,
    },
    ObjectLit { span: Span, values: Vec<Expr> },
    ArrayLit { span: Span, values: Vec<Expr> },
    Await { span: Span, value: Box<Expr> },
    Assign {
        span: Span,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        span: Span,
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Binary {
        span: Span,
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Template { span: Span, parts: Vec<Expr> },
    /// Anything the interface does not model. `parts` preserves embedded
    /// subexpressions so call/allocation/await sites under unmodeled
    /// shapes still exist for indexing; the value itself is opaque.
    Unknown {
        span: Span,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parts: Vec<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Lit { span, .. }
            | Expr::Undefined { span }
            | Expr::Member { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::ObjectLit { span, .. }
            | Expr::ArrayLit { span, .. }
            | Expr::Await { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Template { span, .. }
            | Expr::Unknown { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: u32, end: u32) -> Span {
        Span::new(start, end)
    }

    #[test]
    fn test_stmt_serde_round_trip() {
        let stmt = Stmt::Decl {
            span: span(0, 12),
            declarator: Declarator {
                name: "x".into(),
                span: span(6, 7),
                init: Some(Expr::Ident {
                    span: span(10, 11),
                    name: "y".into(),
                }),
            },
        };
        let json = serde_json::to_string(&stmt).unwrap();
        let back: Stmt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stmt);
        assert!(json.contains("\"kind\":\"decl\""));
    }

    #[test]
    fn test_expr_kind_tags_are_snake_case() {
        let expr = Expr::Member {
            span: span(0, 9),
            object: Box::new(Expr::Ident {
                span: span(0, 3),
                name: "obj".into(),
            }),
            property: Property::Named { name: "p".into() },
            optional: true,
        };
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["kind"], "member");
        assert_eq!(json["optional"], true);
        assert_eq!(json["property"]["kind"], "named");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<Function, _> = serde_json::from_str(
            r#"{"span":{"start":0,"end":1},"kind":"arrow","params":[],"body":{"block":[]},"extra":1}"#,
        );
        assert!(result.is_err());
    }
}
