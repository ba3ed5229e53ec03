//! IR normalization: invariant checks plus canonical ordering.

use crate::model::{FuncIr, IR_SCHEMA_VERSION};
use flowfact_common::ids::PARAM_ANCHOR_BASE;
use flowfact_common::{FlowfactError, Result, VarId};
use std::collections::BTreeSet;

/// Validate and canonically order a function's IR.
///
/// Checks: schema version; contiguous `p0..pN` / `v0..vM`; every
/// referenced VarId declared; every anchor inside the function (same
/// FuncId, real index below the synthetic range); anchor uniqueness.
/// Sorts params, locals and statements (by anchor).
pub fn normalize_ir(mut ir: FuncIr) -> Result<FuncIr> {
    if ir.schema_version != IR_SCHEMA_VERSION {
        return Err(FlowfactError::Schema(format!(
            "unsupported IR schema version {} (expected {})",
            ir.schema_version, IR_SCHEMA_VERSION
        )));
    }

    ir.params.sort();
    ir.locals.sort();

    for (i, param) in ir.params.iter().enumerate() {
        if *param != VarId::Param(i as u32) {
            return Err(FlowfactError::Invariant(format!(
                "params of {} are not contiguous at position {i}",
                ir.func_id.to_canon()
            )));
        }
    }
    for (i, local) in ir.locals.iter().enumerate() {
        if *local != VarId::Local(i as u32) {
            return Err(FlowfactError::Invariant(format!(
                "locals of {} are not contiguous at position {i}",
                ir.func_id.to_canon()
            )));
        }
    }

    let mut anchors = BTreeSet::new();
    for stmt in &ir.stmts {
        let anchor = stmt.anchor();
        if anchor.func() != &ir.func_id {
            return Err(FlowfactError::Invariant(format!(
                "anchor {} lies outside function {}",
                anchor.to_canon(),
                ir.func_id.to_canon()
            )));
        }
        if anchor.index() >= PARAM_ANCHOR_BASE {
            return Err(FlowfactError::Invariant(format!(
                "anchor {} uses a synthetic statement index",
                anchor.to_canon()
            )));
        }
        if !anchors.insert(anchor.clone()) {
            return Err(FlowfactError::Invariant(format!(
                "duplicate anchor {} in {}",
                anchor.to_canon(),
                ir.func_id.to_canon()
            )));
        }
        for var in stmt.referenced_vars() {
            if !ir.declares(var) {
                return Err(FlowfactError::Invariant(format!(
                    "undeclared variable {} in {}",
                    var.to_canon(),
                    ir.func_id.to_canon()
                )));
            }
        }
    }

    ir.stmts.sort_by(|a, b| a.anchor().cmp(b.anchor()));
    Ok(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IrStmt, Rvalue};
    use flowfact_common::{FuncId, StmtId};

    fn func() -> FuncId {
        FuncId::new("src/a.ts", 0, 40).unwrap()
    }

    fn other_func() -> FuncId {
        FuncId::new("src/b.ts", 0, 40).unwrap()
    }

    fn ir_with(stmts: Vec<IrStmt>) -> FuncIr {
        FuncIr {
            schema_version: IR_SCHEMA_VERSION,
            func_id: func(),
            params: vec![VarId::Param(0)],
            locals: vec![VarId::Local(0)],
            stmts,
        }
    }

    #[test]
    fn test_sorts_statements_by_anchor() {
        let ir = ir_with(vec![
            IrStmt::Return {
                stmt: StmtId::new(func(), 2),
                value: None,
            },
            IrStmt::Assign {
                stmt: StmtId::new(func(), 0),
                dst: VarId::Local(0),
                src: Rvalue::var(VarId::Param(0)),
            },
        ]);
        let normalized = normalize_ir(ir).unwrap();
        assert_eq!(normalized.stmts[0].anchor().index(), 0);
        assert_eq!(normalized.stmts[1].anchor().index(), 2);
    }

    #[test]
    fn test_rejects_foreign_anchor() {
        let ir = ir_with(vec![IrStmt::Return {
            stmt: StmtId::new(other_func(), 0),
            value: None,
        }]);
        assert!(matches!(
            normalize_ir(ir),
            Err(FlowfactError::Invariant(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_anchor() {
        let ir = ir_with(vec![
            IrStmt::Assign {
                stmt: StmtId::new(func(), 0),
                dst: VarId::Local(0),
                src: Rvalue::Unknown,
            },
            IrStmt::Return {
                stmt: StmtId::new(func(), 0),
                value: None,
            },
        ]);
        assert!(normalize_ir(ir).is_err());
    }

    #[test]
    fn test_rejects_undeclared_var() {
        let ir = ir_with(vec![IrStmt::Assign {
            stmt: StmtId::new(func(), 0),
            dst: VarId::Local(7),
            src: Rvalue::Unknown,
        }]);
        assert!(normalize_ir(ir).is_err());
    }

    #[test]
    fn test_rejects_non_contiguous_locals() {
        let mut ir = ir_with(vec![]);
        ir.locals = vec![VarId::Local(1)];
        assert!(normalize_ir(ir).is_err());
    }

    #[test]
    fn test_rejects_synthetic_anchor_in_statements() {
        let ir = ir_with(vec![IrStmt::Return {
            stmt: StmtId::param_anchor(func(), 0),
            value: None,
        }]);
        assert!(normalize_ir(ir).is_err());
    }

    #[test]
    fn test_hash_invariant_under_permutation() {
        let a = ir_with(vec![
            IrStmt::Assign {
                stmt: StmtId::new(func(), 0),
                dst: VarId::Local(0),
                src: Rvalue::var(VarId::Param(0)),
            },
            IrStmt::Return {
                stmt: StmtId::new(func(), 1),
                value: Some(Rvalue::var(VarId::Local(0))),
            },
        ]);
        let mut b = a.clone();
        b.stmts.reverse();
        b.params.reverse();
        b.locals.reverse();
        let ha = flowfact_common::canon::canonical_hash(&normalize_ir(a).unwrap()).unwrap();
        let hb = flowfact_common::canon::canonical_hash(&normalize_ir(b).unwrap()).unwrap();
        assert_eq!(ha, hb);
    }
}
