//! Function, statement and callsite indexes.
//!
//! Statement indices are assigned by a deterministic pre-order walk of
//! each function body (source order of start offsets). Statement sites:
//! any statement node except a plain block; call expressions; new
//! expressions; object/array literals; await expressions; and the body
//! root of an expression-bodied arrow (the implicit return). Nested
//! function-like nodes are never descended into; they carry their own
//! FuncId and index.

use flowfact_ast as ast;
use flowfact_common::ids::PARAM_ANCHOR_BASE;
use flowfact_common::{CallsiteId, FlowfactError, FuncId, Result, Span, StmtId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which syntactic shape a statement site comes from. Part of the site
/// key: a statement and the expression at its root may share a span, but
/// never a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    Stmt,
    Call,
    New,
    ObjectLit,
    ArrayLit,
    Await,
}

/// One indexed statement site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub index: u32,
    pub span: Span,
    pub kind: SiteKind,
}

/// Per-function site table: index assignment plus span lookups.
#[derive(Debug, Clone)]
pub struct SiteTable {
    func: FuncId,
    sites: Vec<Site>,
    by_key: BTreeMap<(u32, u32, SiteKind), u32>,
}

impl SiteTable {
    /// Walk a function body and assign statement indices.
    pub fn build(func: FuncId, function: &ast::Function) -> Result<Self> {
        let mut table = Self {
            func,
            sites: Vec::new(),
            by_key: BTreeMap::new(),
        };
        match &function.body {
            ast::FunctionBody::Block(stmts) => {
                for stmt in stmts {
                    table.walk_stmt(stmt)?;
                }
            }
            ast::FunctionBody::Expr(expr) => {
                // The body root models the implicit return and is always a
                // site of its own, distinct from any expression site the
                // same node also is.
                table.assign(expr.span(), SiteKind::Stmt)?;
                table.walk_expr(expr)?;
            }
        }
        Ok(table)
    }

    pub fn func(&self) -> &FuncId {
        &self.func
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// The StmtId of the site at `(span, kind)`, if one was indexed.
    pub fn stmt_id(&self, span: Span, kind: SiteKind) -> Option<StmtId> {
        self.by_key
            .get(&(span.start, span.end, kind))
            .map(|&index| StmtId::new(self.func.clone(), index))
    }

    /// Like [`Self::stmt_id`] but an invariant violation when absent.
    pub fn expect(&self, span: Span, kind: SiteKind) -> Result<StmtId> {
        self.stmt_id(span, kind).ok_or_else(|| {
            FlowfactError::Invariant(format!(
                "no {kind:?} site at {span} in {}",
                self.func.to_canon()
            ))
        })
    }

    fn assign(&mut self, span: Span, kind: SiteKind) -> Result<()> {
        let index = self.sites.len() as u32;
        if index >= PARAM_ANCHOR_BASE {
            return Err(FlowfactError::Invariant(format!(
                "statement count reached the synthetic anchor range in {}",
                self.func.to_canon()
            )));
        }
        if self
            .by_key
            .insert((span.start, span.end, kind), index)
            .is_some()
        {
            return Err(FlowfactError::Invariant(format!(
                "duplicate {kind:?} site at {span} in {}",
                self.func.to_canon()
            )));
        }
        self.sites.push(Site { index, span, kind });
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &ast::Stmt) -> Result<()> {
        // Plain blocks are the only non-site statements.
        if !matches!(stmt, ast::Stmt::Block { .. }) {
            self.assign(stmt.span(), SiteKind::Stmt)?;
        }
        match stmt {
            ast::Stmt::Decl { declarator, .. } => {
                if let Some(init) = &declarator.init {
                    self.walk_expr(init)?;
                }
            }
            ast::Stmt::Expr { expr, .. } => self.walk_expr(expr)?,
            ast::Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.walk_expr(value)?;
                }
            }
            ast::Stmt::Block { body, .. } => {
                for stmt in body {
                    self.walk_stmt(stmt)?;
                }
            }
            ast::Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.walk_expr(cond)?;
                self.walk_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.walk_stmt(else_branch)?;
                }
            }
            ast::Stmt::Loop {
                init, header, body, ..
            } => {
                if let Some(init) = init {
                    self.walk_stmt(init)?;
                }
                for expr in header {
                    self.walk_expr(expr)?;
                }
                self.walk_stmt(body)?;
            }
            ast::Stmt::Throw { value, .. } => self.walk_expr(value)?,
            ast::Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.walk_stmt(block)?;
                if let Some(handler) = handler {
                    self.walk_stmt(handler)?;
                }
                if let Some(finalizer) = finalizer {
                    self.walk_stmt(finalizer)?;
                }
            }
            ast::Stmt::Other { exprs, body, .. } => {
                for expr in exprs {
                    self.walk_expr(expr)?;
                }
                for stmt in body {
                    self.walk_stmt(stmt)?;
                }
            }
        }
        Ok(())
    }

    fn walk_expr(&mut self, expr: &ast::Expr) -> Result<()> {
        match expr {
            ast::Expr::Call { callee, args, .. } => {
                self.assign(expr.span(), SiteKind::Call)?;
                self.walk_expr(callee)?;
                for arg in args {
                    self.walk_expr(arg)?;
                }
            }
            ast::Expr::New { ctor, args, .. } => {
                self.assign(expr.span(), SiteKind::New)?;
                self.walk_expr(ctor)?;
                for arg in args {
                    self.walk_expr(arg)?;
                }
            }
            ast::Expr::ObjectLit { values, .. } => {
                self.assign(expr.span(), SiteKind::ObjectLit)?;
                for value in values {
                    self.walk_expr(value)?;
                }
            }
            ast::Expr::ArrayLit { values, .. } => {
                self.assign(expr.span(), SiteKind::ArrayLit)?;
                for value in values {
                    self.walk_expr(value)?;
                }
            }
            ast::Expr::Await { value, .. } => {
                self.assign(expr.span(), SiteKind::Await)?;
                self.walk_expr(value)?;
            }
            ast::Expr::Member { object, property, .. } => {
                self.walk_expr(object)?;
                if let ast::Property::Computed { key } = property {
                    self.walk_expr(key)?;
                }
            }
            ast::Expr::Assign { target, value, .. } => {
                self.walk_expr(target)?;
                self.walk_expr(value)?;
            }
            ast::Expr::Ternary {
                cond,
                then_value,
                else_value,
                ..
            } => {
                self.walk_expr(cond)?;
                self.walk_expr(then_value)?;
                self.walk_expr(else_value)?;
            }
            ast::Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs)?;
                self.walk_expr(rhs)?;
            }
            ast::Expr::Template { parts, .. } | ast::Expr::Unknown { parts, .. } => {
                for part in parts {
                    self.walk_expr(part)?;
                }
            }
            ast::Expr::Ident { .. }
            | ast::Expr::This { .. }
            | ast::Expr::Lit { .. }
            | ast::Expr::Undefined { .. } => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Function index
// ---------------------------------------------------------------------------

/// One indexed function.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub id: FuncId,
    pub name: Option<String>,
    pub kind: ast::FunctionKind,
    pub param_count: usize,
    /// Position in the program: (file index, function index).
    pub ast_ref: (usize, usize),
}

/// All functions of a program, sorted by FuncId, with id and span lookup.
#[derive(Debug, Default)]
pub struct FunctionIndex {
    records: Vec<FunctionRecord>,
    by_id: BTreeMap<FuncId, usize>,
}

impl FunctionIndex {
    /// Index every function of the program. Duplicate spans fail.
    pub fn build(program: &ast::Program) -> Result<Self> {
        let mut index = Self::default();
        for (file_idx, file) in program.files.iter().enumerate() {
            for (func_idx, function) in file.functions.iter().enumerate() {
                let id = FuncId::new(file.path.clone(), function.span.start, function.span.end)?;
                if index.by_id.contains_key(&id) {
                    return Err(FlowfactError::Invariant(format!(
                        "duplicate function span {}",
                        id.to_canon()
                    )));
                }
                index.records.push(FunctionRecord {
                    id: id.clone(),
                    name: function.name.clone(),
                    kind: function.kind,
                    param_count: function.params.len(),
                    ast_ref: (file_idx, func_idx),
                });
                index.by_id.insert(id, index.records.len() - 1);
            }
        }
        // `records` was pushed in file order; re-sort by id and rebuild
        // the positions.
        index.records.sort_by(|a, b| a.id.cmp(&b.id));
        index.by_id = index
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        debug!(functions = index.records.len(), "built function index");
        Ok(index)
    }

    pub fn records(&self) -> &[FunctionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &FuncId) -> Option<&FunctionRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// Lookup by `(filePath, start, end)` span.
    pub fn by_span(&self, path: &str, start: u32, end: u32) -> Option<&FunctionRecord> {
        let id = FuncId::new(path, start, end).ok()?;
        self.get(&id)
    }

    /// All FuncIds in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = &FuncId> {
        self.records.iter().map(|r| &r.id)
    }

    /// Resolve a record back to its syntax tree.
    pub fn ast_function<'p>(
        &self,
        program: &'p ast::Program,
        id: &FuncId,
    ) -> Option<&'p ast::Function> {
        let record = self.get(id)?;
        program
            .files
            .get(record.ast_ref.0)
            .and_then(|f| f.functions.get(record.ast_ref.1))
    }

    /// Source file paths present in the index, deduplicated, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.records.iter().map(|r| r.id.path()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

// ---------------------------------------------------------------------------
// Statement + callsite indexes
// ---------------------------------------------------------------------------

/// Per-function site tables with global lookups.
#[derive(Debug, Default)]
pub struct StatementIndex {
    tables: BTreeMap<FuncId, SiteTable>,
}

impl StatementIndex {
    /// Build the site table of every indexed function. Duplicate StmtIds
    /// inside a function fail.
    pub fn build(program: &ast::Program, functions: &FunctionIndex) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for record in functions.records() {
            let function = functions
                .ast_function(program, &record.id)
                .ok_or_else(|| {
                    FlowfactError::Invariant(format!(
                        "function {} has no syntax tree",
                        record.id.to_canon()
                    ))
                })?;
            let table = SiteTable::build(record.id.clone(), function)?;
            tables.insert(record.id.clone(), table);
        }
        Ok(Self { tables })
    }

    pub fn table(&self, func: &FuncId) -> Option<&SiteTable> {
        self.tables.get(func)
    }

    /// All StmtIds of one function, in index order.
    pub fn stmt_ids(&self, func: &FuncId) -> Vec<StmtId> {
        self.tables
            .get(func)
            .map(|t| {
                t.sites()
                    .iter()
                    .map(|s| StmtId::new(func.clone(), s.index))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lookup sites by `(filePath, start, end)` across all functions.
    pub fn by_span(&self, path: &str, span: Span) -> Vec<StmtId> {
        let mut found = Vec::new();
        for (func, table) in &self.tables {
            if func.path() != path {
                continue;
            }
            for kind in [
                SiteKind::Stmt,
                SiteKind::Call,
                SiteKind::New,
                SiteKind::ObjectLit,
                SiteKind::ArrayLit,
                SiteKind::Await,
            ] {
                if let Some(id) = table.stmt_id(span, kind) {
                    found.push(id);
                }
            }
        }
        found.sort();
        found
    }
}

/// The statement-index projection to call-expression sites.
#[derive(Debug, Default)]
pub struct CallsiteIndex {
    by_span: BTreeMap<(String, u32, u32), CallsiteId>,
    by_func: BTreeMap<FuncId, Vec<CallsiteId>>,
}

impl CallsiteIndex {
    pub fn build(statements: &StatementIndex) -> Self {
        let mut index = Self::default();
        for (func, table) in &statements.tables {
            let mut ids = Vec::new();
            for site in table.sites() {
                if site.kind == SiteKind::Call {
                    let id = StmtId::new(func.clone(), site.index);
                    index.by_span.insert(
                        (func.path().to_string(), site.span.start, site.span.end),
                        id.clone(),
                    );
                    ids.push(id);
                }
            }
            if !ids.is_empty() {
                index.by_func.insert(func.clone(), ids);
            }
        }
        index
    }

    /// Lookup a callsite by its call-expression span.
    pub fn by_span(&self, path: &str, span: Span) -> Option<&CallsiteId> {
        self.by_span
            .get(&(path.to_string(), span.start, span.end))
    }

    /// All callsites of one function, in index order.
    pub fn of_func(&self, func: &FuncId) -> &[CallsiteId] {
        self.by_func.get(func).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Callsites of `func` ordered by distance from `span.start`; used for
    /// nearest-candidate diagnostics.
    pub fn nearest_in_func(&self, func: &FuncId, span: Span, limit: usize) -> Vec<&CallsiteId> {
        let mut ids: Vec<&CallsiteId> = self.of_func(func).iter().collect();
        ids.sort_by_key(|id| {
            let table_span = self.span_of(id);
            let start = table_span.map(|s| s.start).unwrap_or(u32::MAX);
            start.abs_diff(span.start)
        });
        ids.truncate(limit);
        ids
    }

    /// The call-expression span a callsite was indexed under.
    pub fn span_of(&self, id: &CallsiteId) -> Option<Span> {
        self.by_span
            .iter()
            .find(|(_, v)| *v == id)
            .map(|((_, start, end), _)| Span::new(*start, *end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfact_ast::{Declarator, Expr, Function, FunctionBody, FunctionKind, Param, Program, SourceFile, Stmt};

    fn ident(name: &str, start: u32, end: u32) -> Expr {
        Expr::Ident {
            span: Span::new(start, end),
            name: name.into(),
        }
    }

    /// `function a(x) { const v = b(x); return v; }` by hand.
    fn sample_program() -> Program {
        let call = Expr::Call {
            span: Span::new(26, 30),
            callee: Box::new(ident("b", 26, 27)),
            args: vec![ident("x", 28, 29)],
            optional: false,
        };
        Program {
            schema_version: flowfact_ast::PROGRAM_SCHEMA_VERSION,
            files: vec![SourceFile {
                path: "src/a.ts".into(),
                functions: vec![Function {
                    span: Span::new(0, 45),
                    name: Some("a".into()),
                    kind: FunctionKind::Declaration,
                    params: vec![Param {
                        name: "x".into(),
                        span: Span::new(11, 12),
                    }],
                    body: FunctionBody::Block(vec![
                        Stmt::Decl {
                            span: Span::new(16, 31),
                            declarator: Declarator {
                                name: "v".into(),
                                span: Span::new(22, 23),
                                init: Some(call),
                            },
                        },
                        Stmt::Return {
                            span: Span::new(32, 41),
                            value: Some(ident("v", 39, 40)),
                        },
                    ]),
                }],
            }],
        }
    }

    #[test]
    fn test_site_assignment_is_preorder() {
        let program = sample_program();
        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let func = functions.records()[0].id.clone();
        let table = statements.table(&func).unwrap();
        let kinds: Vec<SiteKind> = table.sites().iter().map(|s| s.kind).collect();
        // decl statement, the call inside it, then the return statement.
        assert_eq!(kinds, vec![SiteKind::Stmt, SiteKind::Call, SiteKind::Stmt]);
        assert_eq!(table.sites()[1].index, 1);
    }

    #[test]
    fn test_callsite_index_projects_calls() {
        let program = sample_program();
        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let callsites = CallsiteIndex::build(&statements);
        let func = functions.records()[0].id.clone();
        assert_eq!(callsites.of_func(&func).len(), 1);
        let cs = callsites.by_span("src/a.ts", Span::new(26, 30)).unwrap();
        assert_eq!(cs.index(), 1);
    }

    #[test]
    fn test_duplicate_function_span_fails() {
        let mut program = sample_program();
        let dup = program.files[0].functions[0].clone();
        program.files[0].functions.push(dup);
        assert!(FunctionIndex::build(&program).is_err());
    }

    #[test]
    fn test_span_lookup_finds_all_kinds() {
        let program = sample_program();
        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let found = statements.by_span("src/a.ts", Span::new(26, 30));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index(), 1);
        assert!(statements.by_span("src/a.ts", Span::new(0, 1)).is_empty());
    }

    #[test]
    fn test_arrow_body_root_gets_implicit_return_site() {
        let body = Expr::Call {
            span: Span::new(10, 14),
            callee: Box::new(ident("f", 10, 11)),
            args: vec![ident("x", 12, 13)],
            optional: false,
        };
        let function = Function {
            span: Span::new(0, 14),
            name: None,
            kind: FunctionKind::Arrow,
            params: vec![Param {
                name: "x".into(),
                span: Span::new(0, 1),
            }],
            body: FunctionBody::Expr(body),
        };
        let func = FuncId::new("src/a.ts", 0, 14).unwrap();
        let table = SiteTable::build(func, &function).unwrap();
        let kinds: Vec<SiteKind> = table.sites().iter().map(|s| s.kind).collect();
        // Implicit-return site first, then the call expression site for
        // the same node.
        assert_eq!(kinds, vec![SiteKind::Stmt, SiteKind::Call]);
    }
}
