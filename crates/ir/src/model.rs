//! The normalized per-function IR.
//!
//! Tagged sum types with exhaustive matches everywhere; unknown source
//! shapes lower to `Rvalue::Unknown`, never a crash. The IR participates
//! in cache keys and explain bundles, so all types serialize with strict
//! camelCase schemas.

use flowfact_common::{CallsiteId, PropName, StmtId, VarId};
use serde::{Deserialize, Serialize};

/// Schema version of the IR wire form.
pub const IR_SCHEMA_VERSION: u32 = 1;

/// Literal payloads the IR keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LitValue {
    Str { value: String },
    Num { value: f64 },
    Bool { value: bool },
    Null,
}

/// Right-hand values: a direct variable reference, a literal, `undefined`,
/// or an opaque value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Rvalue {
    Var { id: VarId },
    Lit { value: LitValue },
    Undef,
    Unknown,
}

impl Rvalue {
    pub fn var(id: VarId) -> Self {
        Self::Var { id }
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self {
            Self::Var { id } => Some(*id),
            _ => None,
        }
    }
}

/// Member-access property in the IR: a concrete name or a dynamic key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PropertyKey {
    Named { name: String },
    Dynamic,
}

impl PropertyKey {
    /// The heap-bucket property this key maps to (`*` for dynamic).
    pub fn to_prop_name(&self) -> PropName {
        match self {
            Self::Named { name } => PropName::Named(name.clone()),
            Self::Dynamic => PropName::Dynamic,
        }
    }
}

/// What kind of allocation site an `alloc` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocKind {
    New,
    Object,
    Array,
}

/// Short-circuiting binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortCircuitOp {
    And,
    Or,
    Nullish,
}

/// One IR statement. Every statement carries its anchor StmtId (the
/// CallsiteId for calls); anchors are unique within a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum IrStmt {
    Assign {
        stmt: StmtId,
        dst: VarId,
        src: Rvalue,
    },
    Return {
        stmt: StmtId,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<Rvalue>,
    },
    Call {
        callsite: CallsiteId,
        #[serde(skip_serializing_if = "Option::is_none")]
        dst: Option<VarId>,
        callee: Rvalue,
        args: Vec<Rvalue>,
    },
    Await {
        stmt: StmtId,
        dst: VarId,
        src: Rvalue,
    },
    Alloc {
        stmt: StmtId,
        dst: VarId,
        alloc: AllocKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        ctor: Option<Rvalue>,
        args: Vec<Rvalue>,
    },
    MemberRead {
        stmt: StmtId,
        dst: VarId,
        object: Rvalue,
        property: PropertyKey,
        optional: bool,
    },
    MemberWrite {
        stmt: StmtId,
        object: Rvalue,
        property: PropertyKey,
        value: Rvalue,
        optional: bool,
    },
    Select {
        stmt: StmtId,
        dst: VarId,
        cond: Rvalue,
        then_value: Rvalue,
        else_value: Rvalue,
    },
    ShortCircuit {
        stmt: StmtId,
        dst: VarId,
        op: ShortCircuitOp,
        lhs: Rvalue,
        rhs: Rvalue,
    },
}

impl IrStmt {
    /// The statement's anchor.
    pub fn anchor(&self) -> &StmtId {
        match self {
            Self::Assign { stmt, .. }
            | Self::Return { stmt, .. }
            | Self::Await { stmt, .. }
            | Self::Alloc { stmt, .. }
            | Self::MemberRead { stmt, .. }
            | Self::MemberWrite { stmt, .. }
            | Self::Select { stmt, .. }
            | Self::ShortCircuit { stmt, .. } => stmt,
            Self::Call { callsite, .. } => callsite,
        }
    }

    /// The variable this statement writes, if any.
    pub fn dst(&self) -> Option<VarId> {
        match self {
            Self::Assign { dst, .. }
            | Self::Await { dst, .. }
            | Self::Alloc { dst, .. }
            | Self::MemberRead { dst, .. }
            | Self::Select { dst, .. }
            | Self::ShortCircuit { dst, .. } => Some(*dst),
            Self::Call { dst, .. } => *dst,
            Self::Return { .. } | Self::MemberWrite { .. } => None,
        }
    }

    /// Every VarId the statement mentions, reads and writes alike.
    pub fn referenced_vars(&self) -> Vec<VarId> {
        let mut vars = Vec::new();
        let mut push_rv = |rv: &Rvalue, vars: &mut Vec<VarId>| {
            if let Some(id) = rv.as_var() {
                vars.push(id);
            }
        };
        match self {
            Self::Assign { dst, src, .. } => {
                vars.push(*dst);
                push_rv(src, &mut vars);
            }
            Self::Return { value, .. } => {
                if let Some(value) = value {
                    push_rv(value, &mut vars);
                }
            }
            Self::Call { dst, callee, args, .. } => {
                if let Some(dst) = dst {
                    vars.push(*dst);
                }
                push_rv(callee, &mut vars);
                for arg in args {
                    push_rv(arg, &mut vars);
                }
            }
            Self::Await { dst, src, .. } => {
                vars.push(*dst);
                push_rv(src, &mut vars);
            }
            Self::Alloc { dst, ctor, args, .. } => {
                vars.push(*dst);
                if let Some(ctor) = ctor {
                    push_rv(ctor, &mut vars);
                }
                for arg in args {
                    push_rv(arg, &mut vars);
                }
            }
            Self::MemberRead { dst, object, .. } => {
                vars.push(*dst);
                push_rv(object, &mut vars);
            }
            Self::MemberWrite { object, value, .. } => {
                push_rv(object, &mut vars);
                push_rv(value, &mut vars);
            }
            Self::Select {
                dst,
                cond,
                then_value,
                else_value,
                ..
            } => {
                vars.push(*dst);
                push_rv(cond, &mut vars);
                push_rv(then_value, &mut vars);
                push_rv(else_value, &mut vars);
            }
            Self::ShortCircuit { dst, lhs, rhs, .. } => {
                vars.push(*dst);
                push_rv(lhs, &mut vars);
                push_rv(rhs, &mut vars);
            }
        }
        vars
    }
}

/// Normalized IR for one function.
///
/// Invariants (enforced by [`crate::normalize::normalize_ir`]): params are
/// contiguous `p0..pN`, locals contiguous `v0..vM`, every referenced VarId
/// is declared, every anchor belongs to `func_id`, anchors are unique, and
/// `stmts` are sorted by anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FuncIr {
    pub schema_version: u32,
    pub func_id: flowfact_common::FuncId,
    pub params: Vec<VarId>,
    pub locals: Vec<VarId>,
    pub stmts: Vec<IrStmt>,
}

impl FuncIr {
    /// Is `id` declared in this IR?
    pub fn declares(&self, id: VarId) -> bool {
        match id {
            VarId::Param(i) => (i as usize) < self.params.len(),
            VarId::Local(i) => (i as usize) < self.locals.len(),
        }
    }

    /// The call statement anchored at `callsite`, if any.
    pub fn call_at(&self, callsite: &CallsiteId) -> Option<&IrStmt> {
        self.stmts.iter().find(
            |s| matches!(s, IrStmt::Call { callsite: c, .. } if c == callsite),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfact_common::FuncId;

    fn func() -> FuncId {
        FuncId::new("src/a.ts", 0, 40).unwrap()
    }

    #[test]
    fn test_anchor_and_dst_accessors() {
        let stmt = IrStmt::Call {
            callsite: StmtId::new(func(), 1),
            dst: Some(VarId::Local(0)),
            callee: Rvalue::Unknown,
            args: vec![Rvalue::var(VarId::Param(0))],
        };
        assert_eq!(stmt.anchor().index(), 1);
        assert_eq!(stmt.dst(), Some(VarId::Local(0)));
        assert_eq!(
            stmt.referenced_vars(),
            vec![VarId::Local(0), VarId::Param(0)]
        );
    }

    #[test]
    fn test_ir_serde_round_trip() {
        let ir = FuncIr {
            schema_version: IR_SCHEMA_VERSION,
            func_id: func(),
            params: vec![VarId::Param(0)],
            locals: vec![VarId::Local(0)],
            stmts: vec![
                IrStmt::MemberRead {
                    stmt: StmtId::new(func(), 0),
                    dst: VarId::Local(0),
                    object: Rvalue::var(VarId::Param(0)),
                    property: PropertyKey::Named { name: "value".into() },
                    optional: true,
                },
                IrStmt::Return {
                    stmt: StmtId::new(func(), 1),
                    value: Some(Rvalue::var(VarId::Local(0))),
                },
            ],
        };
        let json = serde_json::to_string(&ir).unwrap();
        let back: FuncIr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ir);
        assert!(json.contains("\"funcId\":\"f:src%2Fa.ts:0:40\""));
    }

    #[test]
    fn test_declares_checks_contiguous_ranges() {
        let ir = FuncIr {
            schema_version: IR_SCHEMA_VERSION,
            func_id: func(),
            params: vec![VarId::Param(0), VarId::Param(1)],
            locals: vec![],
            stmts: vec![],
        };
        assert!(ir.declares(VarId::Param(1)));
        assert!(!ir.declares(VarId::Param(2)));
        assert!(!ir.declares(VarId::Local(0)));
    }
}
