use thiserror::Error;

/// One frame of the synthetic traceback, pushed innermost-first while the
/// evaluator unwinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Source line (1-based) inside the executed cell or function body.
    pub line: u32,
    /// Scope name: `<module>` or the function/method name.
    pub scope: String,
}

/// Error raised while evaluating user code.
///
/// Errors carry the Python exception shape the wire protocol wants: an
/// exception name, a message, and the frames the evaluator unwound through.
/// Handlers convert this into `ename`/`evalue`/`traceback` before reply
/// composition.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{ename}: {evalue}")]
pub struct PyError {
    pub ename: String,
    pub evalue: String,
    pub frames: Vec<Frame>,
}

impl PyError {
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self {
            ename: ename.into(),
            evalue: evalue.into(),
            frames: Vec::new(),
        }
    }

    pub fn syntax(evalue: impl Into<String>, line: u32) -> Self {
        let mut err = Self::new("SyntaxError", evalue);
        err.frames.push(Frame {
            line,
            scope: "<module>".to_string(),
        });
        err
    }

    pub fn name_error(name: &str) -> Self {
        Self::new("NameError", format!("name '{name}' is not defined"))
    }

    pub fn type_error(evalue: impl Into<String>) -> Self {
        Self::new("TypeError", evalue)
    }

    pub fn value_error(evalue: impl Into<String>) -> Self {
        Self::new("ValueError", evalue)
    }

    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::new(
            "AttributeError",
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    pub fn key_error(key_repr: &str) -> Self {
        Self::new("KeyError", key_repr.to_string())
    }

    pub fn index_error(evalue: impl Into<String>) -> Self {
        Self::new("IndexError", evalue)
    }

    pub fn zero_division(evalue: impl Into<String>) -> Self {
        Self::new("ZeroDivisionError", evalue)
    }

    pub fn import_error(module: &str) -> Self {
        Self::new("ImportError", format!("No module named {module}"))
    }

    pub fn interrupt() -> Self {
        Self::new("KeyboardInterrupt", "")
    }

    pub fn is_interrupt(&self) -> bool {
        self.ename == "KeyboardInterrupt"
    }

    /// Push a traceback frame as the error crosses a scope boundary.
    pub fn with_frame(mut self, line: u32, scope: &str) -> Self {
        self.frames.push(Frame {
            line,
            scope: scope.to_string(),
        });
        self
    }

    /// Render CPython-style traceback lines.
    ///
    /// `filename` is the synthetic execution location, e.g. `<Jupyter In[3]>`.
    pub fn traceback_lines(&self, filename: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.frames.len() + 2);
        if self.ename == "SyntaxError" {
            if let Some(frame) = self.frames.first() {
                lines.push(format!("  File \"{filename}\", line {}", frame.line));
            }
            lines.push(self.headline());
            return lines;
        }
        lines.push("Traceback (most recent call last):".to_string());
        // frames were pushed innermost-first while unwinding
        for frame in self.frames.iter().rev() {
            lines.push(format!(
                "  File \"{filename}\", line {}, in {}",
                frame.line, frame.scope
            ));
        }
        lines.push(self.headline());
        lines
    }

    fn headline(&self) -> String {
        if self.evalue.is_empty() {
            self.ename.clone()
        } else {
            format!("{}: {}", self.ename, self.evalue)
        }
    }
}
