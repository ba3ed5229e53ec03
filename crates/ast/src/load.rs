//! Strict loader for program interchange JSON.
//!
//! Unknown keys, wrong value types and schema-version mismatches are
//! rejected; span and path invariants are checked before anything
//! downstream sees the tree.

use crate::{Function, Program, PROGRAM_SCHEMA_VERSION};
use flowfact_common::ids::validate_repo_path;
use flowfact_common::{FlowfactError, Result};
use std::path::Path;
use tracing::debug;

/// Parse and validate a program produced by an external frontend.
pub fn load_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)?;
    let program = parse_program(&text)?;
    debug!(
        files = program.files.len(),
        "loaded external program from {}",
        path.display()
    );
    Ok(program)
}

/// Parse and validate program JSON from a string.
pub fn parse_program(text: &str) -> Result<Program> {
    let program: Program = serde_json::from_str(text)
        .map_err(|e| FlowfactError::Schema(format!("program json: {e}")))?;
    validate_program(&program)?;
    Ok(program)
}

/// Check the structural invariants every frontend must satisfy.
pub fn validate_program(program: &Program) -> Result<()> {
    if program.schema_version != PROGRAM_SCHEMA_VERSION {
        return Err(FlowfactError::Schema(format!(
            "unsupported program schema version {} (expected {})",
            program.schema_version, PROGRAM_SCHEMA_VERSION
        )));
    }
    for file in &program.files {
        validate_repo_path(&file.path)
            .map_err(|e| FlowfactError::Schema(format!("file path '{}': {e}", file.path)))?;
        for function in &file.functions {
            validate_function(&file.path, function)?;
        }
    }
    Ok(())
}

fn validate_function(path: &str, function: &Function) -> Result<()> {
    if function.span.end < function.span.start {
        return Err(FlowfactError::Schema(format!(
            "{path}: function span {} ends before it starts",
            function.span
        )));
    }
    for param in &function.params {
        if param.name.is_empty() {
            return Err(FlowfactError::Schema(format!(
                "{path}: empty parameter name in function at {}",
                function.span
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionBody, FunctionKind, Param, SourceFile};
    use flowfact_common::Span;

    fn minimal_program() -> Program {
        Program {
            schema_version: PROGRAM_SCHEMA_VERSION,
            files: vec![SourceFile {
                path: "src/a.ts".into(),
                functions: vec![Function {
                    span: Span::new(0, 20),
                    name: Some("id".into()),
                    kind: FunctionKind::Declaration,
                    params: vec![Param {
                        name: "x".into(),
                        span: Span::new(12, 13),
                    }],
                    body: FunctionBody::Block(vec![]),
                }],
            }],
        }
    }

    #[test]
    fn test_round_trip_through_json() {
        let program = minimal_program();
        let json = serde_json::to_string(&program).unwrap();
        let back = parse_program(&json).unwrap();
        assert_eq!(back, program);
    }

    #[test]
    fn test_rejects_wrong_schema_version() {
        let mut program = minimal_program();
        program.schema_version = 2;
        let json = serde_json::to_string(&program).unwrap();
        assert!(parse_program(&json).is_err());
    }

    #[test]
    fn test_rejects_bad_paths() {
        let mut program = minimal_program();
        program.files[0].path = "/abs/a.ts".into();
        assert!(validate_program(&program).is_err());
        program.files[0].path = "src\\a.ts".into();
        assert!(validate_program(&program).is_err());
    }

    #[test]
    fn test_rejects_inverted_function_span() {
        let mut program = minimal_program();
        program.files[0].functions[0].span = Span::new(20, 0);
        assert!(validate_program(&program).is_err());
    }
}
