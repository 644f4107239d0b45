//! Execution results stored in session history.

use crate::interpreter::Value;

/// Error shape every handler converts to before reply composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
    /// True when the user interrupted execution (reply status `abort`).
    pub interrupted: bool,
}

impl ExecutionError {
    pub fn formatted_traceback(&self) -> String {
        let mut text = self.traceback.join("\n");
        text.push('\n');
        text
    }
}

/// One completed `execute()` call: the code, its captured streams, the last
/// displayed value, and the error if one stopped it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub code: String,
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    pub display_object: Option<Value>,
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `text/plain` rendering of the display object, if any.
    pub fn display_text(&self) -> Option<String> {
        self.display_object.as_ref().map(Value::repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_uses_repr() {
        let result = ExecutionResult {
            display_object: Some(Value::str("hi")),
            ..Default::default()
        };
        assert_eq!(result.display_text().unwrap(), "'hi'");
    }

    #[test]
    fn formatted_traceback_joins_lines() {
        let error = ExecutionError {
            ename: "NameError".into(),
            evalue: "name 'x' is not defined".into(),
            traceback: vec!["a".into(), "b".into()],
            interrupted: false,
        };
        assert_eq!(error.formatted_traceback(), "a\nb\n");
    }
}
