//! Bounded evaluation scope for source-text callbacks
//!
//! A job may carry a snippet of text instead of a function. Snippets never
//! run arbitrary code: they are sequences of `name = <json>` assignments,
//! separated by `;`, applied to a variable map owned by the clock. Names are
//! identifiers with optional dotted segments (`harness.evalCalled`), stored
//! verbatim. The whole snippet is parsed before any assignment is applied.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("statement {statement:?} is not an assignment")]
    NotAnAssignment { statement: String },

    #[error("invalid variable name {name:?}")]
    InvalidName { name: String },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Variables visible to source-text callbacks
#[derive(Debug, Default, Clone)]
pub struct ScriptScope {
    vars: BTreeMap<String, Value>,
}

impl ScriptScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Parse `source` and apply its assignments in order
    pub fn eval(&mut self, source: &str) -> Result<(), ScriptError> {
        let assignments = parse(source)?;
        for (name, value) in assignments {
            tracing::trace!(name = %name, "script assignment");
            self.vars.insert(name, value);
        }
        Ok(())
    }
}

fn parse(source: &str) -> Result<Vec<(String, Value)>, ScriptError> {
    split_statements(source)?
        .into_iter()
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(parse_assignment)
        .collect()
}

fn parse_assignment(statement: &str) -> Result<(String, Value), ScriptError> {
    let (name, value) = statement
        .split_once('=')
        .ok_or_else(|| ScriptError::NotAnAssignment { statement: statement.to_string() })?;
    let name = name.trim();
    if !is_valid_name(name) {
        return Err(ScriptError::InvalidName { name: name.to_string() });
    }
    let value = serde_json::from_str(value.trim()).map_err(|e| ScriptError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((name.to_string(), value))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

/// Split on `;` outside of JSON string literals
fn split_statements(source: &str) -> Result<Vec<&str>, ScriptError> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in source.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' => {
                statements.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_string {
        return Err(ScriptError::UnterminatedString);
    }
    statements.push(&source[start..]);
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_snippet_is_a_no_op() {
        let mut scope = ScriptScope::new();
        scope.eval("").unwrap();
        scope.eval("  ;  ; ").unwrap();
        assert!(scope.is_empty());
    }

    #[test]
    fn applies_assignments_in_order() {
        let mut scope = ScriptScope::new();
        scope.eval("harness.evalCalled = true; count = 1; count = 2; msg = \"a;b\"").unwrap();
        assert_eq!(scope.get("harness.evalCalled"), Some(&json!(true)));
        assert_eq!(scope.get("count"), Some(&json!(2)));
        assert_eq!(scope.get("msg"), Some(&json!("a;b")));
    }

    #[test]
    fn parse_errors_leave_scope_untouched() {
        let mut scope = ScriptScope::new();
        let err = scope.eval("ok = 1; launch()").unwrap_err();
        assert!(matches!(err, ScriptError::NotAnAssignment { .. }));
        assert!(scope.get("ok").is_none());

        assert!(matches!(scope.eval("1x = 3"), Err(ScriptError::InvalidName { .. })));
        assert!(matches!(scope.eval("x = nope"), Err(ScriptError::InvalidValue { .. })));
        assert!(matches!(scope.eval("x = \"open"), Err(ScriptError::UnterminatedString)));
    }
}
