//! Lowering from frontend syntax trees to the normalized IR.
//!
//! The lowering table, in brief:
//! - `x = y` / `const x = y`        → `assign`
//! - `x = f(...)` / `f(...)`        → `call` (dst present or null)
//! - `return y` / `return f(...)`   → `return`, with a temp for the call
//! - `await y` / `await f(...)`     → `await`, with a temp for the call
//! - `obj.p = y`                    → `member_write`
//! - `x = obj.p` / `x = obj?.p`     → `member_read` (`??` over a member
//!   access peels to the member read)
//! - `x = c ? t : e`                → `select`
//! - `x = a && b` etc.              → `short_circuit`
//! - `new C(...)`, `{...}`, `[...]` → `alloc`
//!
//! Rvalues that are not direct variable references degrade to `unknown`.
//! Call, allocation and await expressions in operand position get
//! temporaries; every such site in any expression position is emitted so
//! no indexed callsite is missing from the IR.

use crate::index::{SiteKind, SiteTable};
use crate::model::{AllocKind, FuncIr, IrStmt, LitValue, PropertyKey, Rvalue, ShortCircuitOp, IR_SCHEMA_VERSION};
use flowfact_ast as ast;
use flowfact_common::{FuncId, Result, VarId};
use std::collections::BTreeMap;

/// Lower one function into (un-normalized) IR. Statements come out in
/// emission order; the normalizer sorts them by anchor.
pub fn build_ir(func_id: &FuncId, function: &ast::Function, sites: &SiteTable) -> Result<FuncIr> {
    let mut builder = IrBuilder::new(func_id.clone(), sites);
    builder.declare_params(function);
    builder.declare_named_locals(function);
    builder.lower_body(function)?;
    Ok(builder.finish())
}

struct IrBuilder<'a> {
    func: FuncId,
    sites: &'a SiteTable,
    /// Name resolution; the first declaration of a name wins.
    names: BTreeMap<String, VarId>,
    param_count: u32,
    local_count: u32,
    /// Reserved receiver local for `this`, allocated on first use.
    receiver: Option<VarId>,
    stmts: Vec<IrStmt>,
}

impl<'a> IrBuilder<'a> {
    fn new(func: FuncId, sites: &'a SiteTable) -> Self {
        Self {
            func,
            sites,
            names: BTreeMap::new(),
            param_count: 0,
            local_count: 0,
            receiver: None,
            stmts: Vec::new(),
        }
    }

    fn declare_params(&mut self, function: &ast::Function) {
        for (i, param) in function.params.iter().enumerate() {
            let id = VarId::Param(i as u32);
            self.names.entry(param.name.clone()).or_insert(id);
            self.param_count += 1;
        }
    }

    /// Pass 1 of local allocation: one `v` per named declaration, in
    /// source order. Temps are appended later as lowering encounters them.
    fn declare_named_locals(&mut self, function: &ast::Function) {
        fn walk(stmt: &ast::Stmt, builder: &mut IrBuilder<'_>) {
            match stmt {
                ast::Stmt::Decl { declarator, .. } => {
                    let id = builder.fresh_local();
                    builder.names.entry(declarator.name.clone()).or_insert(id);
                }
                ast::Stmt::Block { body, .. } | ast::Stmt::Other { body, .. } => {
                    for stmt in body {
                        walk(stmt, builder);
                    }
                }
                ast::Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    walk(then_branch, builder);
                    if let Some(else_branch) = else_branch {
                        walk(else_branch, builder);
                    }
                }
                ast::Stmt::Loop { init, body, .. } => {
                    if let Some(init) = init {
                        walk(init, builder);
                    }
                    walk(body, builder);
                }
                ast::Stmt::Try {
                    block,
                    handler,
                    finalizer,
                    ..
                } => {
                    walk(block, builder);
                    if let Some(handler) = handler {
                        walk(handler, builder);
                    }
                    if let Some(finalizer) = finalizer {
                        walk(finalizer, builder);
                    }
                }
                ast::Stmt::Expr { .. } | ast::Stmt::Return { .. } | ast::Stmt::Throw { .. } => {}
            }
        }
        if let ast::FunctionBody::Block(stmts) = &function.body {
            for stmt in stmts {
                walk(stmt, self);
            }
        }
    }

    fn finish(self) -> FuncIr {
        FuncIr {
            schema_version: IR_SCHEMA_VERSION,
            func_id: self.func,
            params: (0..self.param_count).map(VarId::Param).collect(),
            locals: (0..self.local_count).map(VarId::Local).collect(),
            stmts: self.stmts,
        }
    }

    fn fresh_local(&mut self) -> VarId {
        let id = VarId::Local(self.local_count);
        self.local_count += 1;
        id
    }

    fn receiver_local(&mut self) -> VarId {
        if let Some(id) = self.receiver {
            return id;
        }
        let id = self.fresh_local();
        self.receiver = Some(id);
        id
    }

    // -- statements ---------------------------------------------------------

    fn lower_body(&mut self, function: &ast::Function) -> Result<()> {
        match &function.body {
            ast::FunctionBody::Block(stmts) => {
                for stmt in stmts {
                    self.lower_stmt(stmt)?;
                }
            }
            ast::FunctionBody::Expr(root) => {
                // Expression-bodied arrow: the body root is the implicit
                // return's anchor.
                let anchor = self.sites.expect(root.span(), SiteKind::Stmt)?;
                let value = self.lower_operand(root)?;
                self.stmts.push(IrStmt::Return {
                    stmt: anchor,
                    value: Some(value),
                });
            }
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Result<()> {
        match stmt {
            ast::Stmt::Decl { span, declarator } => {
                if let Some(init) = &declarator.init {
                    let dst = self.names[&declarator.name];
                    let site = self.sites.expect(*span, SiteKind::Stmt)?;
                    self.lower_value_into(dst, init, site)?;
                }
                Ok(())
            }
            ast::Stmt::Expr { span, expr } => self.lower_expr_stmt(*span, expr),
            ast::Stmt::Return { span, value } => {
                let site = self.sites.expect(*span, SiteKind::Stmt)?;
                let value = match value {
                    Some(value) => Some(self.lower_operand(value)?),
                    None => None,
                };
                self.stmts.push(IrStmt::Return { stmt: site, value });
                Ok(())
            }
            ast::Stmt::Block { body, .. } => {
                for stmt in body {
                    self.lower_stmt(stmt)?;
                }
                Ok(())
            }
            ast::Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.lower_effects(cond)?;
                self.lower_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.lower_stmt(else_branch)?;
                }
                Ok(())
            }
            ast::Stmt::Loop {
                init, header, body, ..
            } => {
                if let Some(init) = init {
                    self.lower_stmt(init)?;
                }
                for expr in header {
                    self.lower_effects(expr)?;
                }
                self.lower_stmt(body)
            }
            ast::Stmt::Throw { value, .. } => self.lower_effects(value),
            ast::Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.lower_stmt(block)?;
                if let Some(handler) = handler {
                    self.lower_stmt(handler)?;
                }
                if let Some(finalizer) = finalizer {
                    self.lower_stmt(finalizer)?;
                }
                Ok(())
            }
            ast::Stmt::Other { exprs, body, .. } => {
                for expr in exprs {
                    self.lower_effects(expr)?;
                }
                for stmt in body {
                    self.lower_stmt(stmt)?;
                }
                Ok(())
            }
        }
    }

    /// Expression statements: assignments, bare calls, bare awaits;
    /// everything else contributes effects only.
    fn lower_expr_stmt(&mut self, span: flowfact_common::Span, expr: &ast::Expr) -> Result<()> {
        match expr {
            ast::Expr::Assign { target, value, .. } => {
                match target.as_ref() {
                    ast::Expr::Ident { name, .. } => {
                        if let Some(dst) = self.names.get(name).copied() {
                            let site = self.sites.expect(span, SiteKind::Stmt)?;
                            self.lower_value_into(dst, value, site)?;
                        } else {
                            // Assignment to an unindexed (global) name.
                            self.lower_effects(value)?;
                        }
                    }
                    ast::Expr::Member {
                        object,
                        property,
                        optional,
                        ..
                    } => {
                        let site = self.sites.expect(span, SiteKind::Stmt)?;
                        let object_rv = self.lower_operand(object)?;
                        let key = self.lower_property(property)?;
                        let value_rv = self.lower_operand(value)?;
                        self.stmts.push(IrStmt::MemberWrite {
                            stmt: site,
                            object: object_rv,
                            property: key,
                            value: value_rv,
                            optional: *optional,
                        });
                    }
                    other => {
                        self.lower_effects(other)?;
                        self.lower_effects(value)?;
                    }
                }
                Ok(())
            }
            ast::Expr::Call { .. } => {
                self.emit_call(expr, None)?;
                Ok(())
            }
            ast::Expr::Await { value, .. } => {
                let site = self.sites.expect(expr.span(), SiteKind::Await)?;
                let src = self.lower_operand(value)?;
                let dst = self.fresh_local();
                self.stmts.push(IrStmt::Await { stmt: site, dst, src });
                Ok(())
            }
            other => self.lower_effects(other),
        }
    }

    // -- value lowering -----------------------------------------------------

    /// Direct right-hand sides of assignments and declarations; `site` is
    /// the enclosing statement's anchor.
    fn lower_value_into(
        &mut self,
        dst: VarId,
        rhs: &ast::Expr,
        site: flowfact_common::StmtId,
    ) -> Result<()> {
        match rhs {
            ast::Expr::Call { .. } => {
                self.emit_call(rhs, Some(dst))?;
                Ok(())
            }
            ast::Expr::New { ctor, args, .. } => {
                let anchor = self.sites.expect(rhs.span(), SiteKind::New)?;
                let ctor_rv = self.lower_operand(ctor)?;
                let args = self.lower_operands(args)?;
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst,
                    alloc: AllocKind::New,
                    ctor: Some(ctor_rv),
                    args,
                });
                Ok(())
            }
            ast::Expr::ObjectLit { values, .. } => {
                let anchor = self.sites.expect(rhs.span(), SiteKind::ObjectLit)?;
                let args = self.lower_operands(values)?;
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst,
                    alloc: AllocKind::Object,
                    ctor: None,
                    args,
                });
                Ok(())
            }
            ast::Expr::ArrayLit { values, .. } => {
                let anchor = self.sites.expect(rhs.span(), SiteKind::ArrayLit)?;
                let args = self.lower_operands(values)?;
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst,
                    alloc: AllocKind::Array,
                    ctor: None,
                    args,
                });
                Ok(())
            }
            ast::Expr::Await { value, .. } => {
                let anchor = self.sites.expect(rhs.span(), SiteKind::Await)?;
                let src = self.lower_operand(value)?;
                self.stmts.push(IrStmt::Await {
                    stmt: anchor,
                    dst,
                    src,
                });
                Ok(())
            }
            ast::Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                self.emit_member_read(dst, object, property, *optional, site)?;
                Ok(())
            }
            ast::Expr::Binary { op, lhs, rhs: rhs_e, .. } if op == "??" => {
                // `obj?.p ?? d` is a member read with a fallback; the RHS
                // is peeled when the left is a member access.
                if let ast::Expr::Member {
                    object,
                    property,
                    optional,
                    ..
                } = lhs.as_ref()
                {
                    self.emit_member_read(dst, object, property, *optional, site)?;
                    self.lower_effects(rhs_e)?;
                    return Ok(());
                }
                self.emit_short_circuit(dst, ShortCircuitOp::Nullish, lhs, rhs_e, site)
            }
            ast::Expr::Binary { op, lhs, rhs: rhs_e, .. } if op == "&&" => {
                self.emit_short_circuit(dst, ShortCircuitOp::And, lhs, rhs_e, site)
            }
            ast::Expr::Binary { op, lhs, rhs: rhs_e, .. } if op == "||" => {
                self.emit_short_circuit(dst, ShortCircuitOp::Or, lhs, rhs_e, site)
            }
            ast::Expr::Ternary {
                cond,
                then_value,
                else_value,
                ..
            } => {
                let cond = self.lower_operand(cond)?;
                let then_value = self.lower_operand(then_value)?;
                let else_value = self.lower_operand(else_value)?;
                self.stmts.push(IrStmt::Select {
                    stmt: site,
                    dst,
                    cond,
                    then_value,
                    else_value,
                });
                Ok(())
            }
            ast::Expr::Ident { .. }
            | ast::Expr::This { .. }
            | ast::Expr::Lit { .. }
            | ast::Expr::Undefined { .. } => {
                let src = self.simple_rvalue(rhs);
                self.stmts.push(IrStmt::Assign { stmt: site, dst, src });
                Ok(())
            }
            other => {
                // Opaque value; keep its embedded sites.
                self.lower_effects(other)?;
                self.stmts.push(IrStmt::Assign {
                    stmt: site,
                    dst,
                    src: Rvalue::Unknown,
                });
                Ok(())
            }
        }
    }

    fn emit_member_read(
        &mut self,
        dst: VarId,
        object: &ast::Expr,
        property: &ast::Property,
        optional: bool,
        site: flowfact_common::StmtId,
    ) -> Result<()> {
        let object_rv = self.lower_operand(object)?;
        let key = self.lower_property(property)?;
        self.stmts.push(IrStmt::MemberRead {
            stmt: site,
            dst,
            object: object_rv,
            property: key,
            optional,
        });
        Ok(())
    }

    fn emit_short_circuit(
        &mut self,
        dst: VarId,
        op: ShortCircuitOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        site: flowfact_common::StmtId,
    ) -> Result<()> {
        let lhs = self.lower_operand(lhs)?;
        let rhs = self.lower_operand(rhs)?;
        self.stmts.push(IrStmt::ShortCircuit {
            stmt: site,
            dst,
            op,
            lhs,
            rhs,
        });
        Ok(())
    }

    /// A property expression's IR key. Computed keys that are string
    /// literals become named properties; any other computed key is
    /// dynamic, with its embedded sites preserved.
    fn lower_property(&mut self, property: &ast::Property) -> Result<PropertyKey> {
        match property {
            ast::Property::Named { name } => Ok(PropertyKey::Named { name: name.clone() }),
            ast::Property::Computed { key } => match key.as_ref() {
                ast::Expr::Lit {
                    value: ast::Lit::Str { value },
                    ..
                } => Ok(PropertyKey::Named {
                    name: value.clone(),
                }),
                other => {
                    self.lower_effects(other)?;
                    Ok(PropertyKey::Dynamic)
                }
            },
        }
    }

    /// Operand position: direct references stay direct, call/allocation/
    /// await results go through temps, everything else is opaque (with
    /// its embedded sites preserved).
    fn lower_operand(&mut self, expr: &ast::Expr) -> Result<Rvalue> {
        match expr {
            ast::Expr::Ident { .. }
            | ast::Expr::This { .. }
            | ast::Expr::Lit { .. }
            | ast::Expr::Undefined { .. } => Ok(self.simple_rvalue(expr)),
            ast::Expr::Call { .. } => {
                let tmp = self.fresh_local();
                self.emit_call(expr, Some(tmp))?;
                Ok(Rvalue::var(tmp))
            }
            ast::Expr::New { ctor, args, .. } => {
                let anchor = self.sites.expect(expr.span(), SiteKind::New)?;
                let ctor_rv = self.lower_operand(ctor)?;
                let args = self.lower_operands(args)?;
                let tmp = self.fresh_local();
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst: tmp,
                    alloc: AllocKind::New,
                    ctor: Some(ctor_rv),
                    args,
                });
                Ok(Rvalue::var(tmp))
            }
            ast::Expr::ObjectLit { values, .. } => {
                let anchor = self.sites.expect(expr.span(), SiteKind::ObjectLit)?;
                let args = self.lower_operands(values)?;
                let tmp = self.fresh_local();
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst: tmp,
                    alloc: AllocKind::Object,
                    ctor: None,
                    args,
                });
                Ok(Rvalue::var(tmp))
            }
            ast::Expr::ArrayLit { values, .. } => {
                let anchor = self.sites.expect(expr.span(), SiteKind::ArrayLit)?;
                let args = self.lower_operands(values)?;
                let tmp = self.fresh_local();
                self.stmts.push(IrStmt::Alloc {
                    stmt: anchor,
                    dst: tmp,
                    alloc: AllocKind::Array,
                    ctor: None,
                    args,
                });
                Ok(Rvalue::var(tmp))
            }
            ast::Expr::Await { value, .. } => {
                let anchor = self.sites.expect(expr.span(), SiteKind::Await)?;
                let src = self.lower_operand(value)?;
                let tmp = self.fresh_local();
                self.stmts.push(IrStmt::Await {
                    stmt: anchor,
                    dst: tmp,
                    src,
                });
                Ok(Rvalue::var(tmp))
            }
            other => {
                self.lower_effect_children(other)?;
                Ok(Rvalue::Unknown)
            }
        }
    }

    fn lower_operands(&mut self, exprs: &[ast::Expr]) -> Result<Vec<Rvalue>> {
        exprs.iter().map(|e| self.lower_operand(e)).collect()
    }

    fn simple_rvalue(&mut self, expr: &ast::Expr) -> Rvalue {
        match expr {
            ast::Expr::Ident { name, .. } => match self.names.get(name) {
                Some(&id) => Rvalue::var(id),
                None => Rvalue::Unknown,
            },
            ast::Expr::This { .. } => Rvalue::var(self.receiver_local()),
            ast::Expr::Undefined { .. } => Rvalue::Undef,
            ast::Expr::Lit { value, .. } => Rvalue::Lit {
                value: match value {
                    ast::Lit::Str { value } => LitValue::Str {
                        value: value.clone(),
                    },
                    ast::Lit::Num { value } => LitValue::Num { value: *value },
                    ast::Lit::Bool { value } => LitValue::Bool { value: *value },
                    ast::Lit::Null => LitValue::Null,
                },
            },
            _ => Rvalue::Unknown,
        }
    }

    fn emit_call(&mut self, call: &ast::Expr, dst: Option<VarId>) -> Result<()> {
        let ast::Expr::Call { callee, args, .. } = call else {
            return Err(flowfact_common::FlowfactError::Invariant(
                "emit_call on a non-call expression".into(),
            ));
        };
        let callsite = self.sites.expect(call.span(), SiteKind::Call)?;
        let callee_rv = self.lower_operand(callee)?;
        let args = self.lower_operands(args)?;
        self.stmts.push(IrStmt::Call {
            callsite,
            dst,
            callee: callee_rv,
            args,
        });
        Ok(())
    }

    /// Effect-only walk: emit IR for every call/allocation/await site
    /// inside `expr`, discarding values.
    fn lower_effects(&mut self, expr: &ast::Expr) -> Result<()> {
        match expr {
            ast::Expr::Call { .. }
            | ast::Expr::New { .. }
            | ast::Expr::ObjectLit { .. }
            | ast::Expr::ArrayLit { .. }
            | ast::Expr::Await { .. } => {
                let _ = self.lower_operand(expr)?;
                Ok(())
            }
            other => self.lower_effect_children(other),
        }
    }

    fn lower_effect_children(&mut self, expr: &ast::Expr) -> Result<()> {
        match expr {
            ast::Expr::Member { object, property, .. } => {
                self.lower_effects(object)?;
                if let ast::Property::Computed { key } = property {
                    self.lower_effects(key)?;
                }
                Ok(())
            }
            ast::Expr::Assign { target, value, .. } => {
                self.lower_effects(target)?;
                self.lower_effects(value)
            }
            ast::Expr::Ternary {
                cond,
                then_value,
                else_value,
                ..
            } => {
                self.lower_effects(cond)?;
                self.lower_effects(then_value)?;
                self.lower_effects(else_value)
            }
            ast::Expr::Binary { lhs, rhs, .. } => {
                self.lower_effects(lhs)?;
                self.lower_effects(rhs)
            }
            ast::Expr::Template { parts, .. } | ast::Expr::Unknown { parts, .. } => {
                for part in parts {
                    self.lower_effects(part)?;
                }
                Ok(())
            }
            ast::Expr::Ident { .. }
            | ast::Expr::This { .. }
            | ast::Expr::Lit { .. }
            | ast::Expr::Undefined { .. }
            | ast::Expr::Call { .. }
            | ast::Expr::New { .. }
            | ast::Expr::ObjectLit { .. }
            | ast::Expr::ArrayLit { .. }
            | ast::Expr::Await { .. } => Ok(()),
        }
    }
}
