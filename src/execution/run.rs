//! The per-call executor: statement-granular interactive execution with
//! captured streams and an isolated display hook.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::PyError;
use crate::execution::results::{ExecutionError, ExecutionResult};
use crate::interpreter::ast::Stmt;
use crate::interpreter::{Evaluator, Flow, Scope, parse};
use crate::interpreter::value::Value;

/// Runs one code cell against a scope pair.
///
/// The executor owns the redirected stream buffers for the duration of the
/// call; they are folded into the returned `ExecutionResult` on every exit
/// path, error or not. Each top-level statement compiles and runs as its own
/// interactive unit: expression statements feed the display hook, and
/// module-level bindings are promoted from locals to globals after every
/// statement so that names defined at the prompt are visible inside
/// subsequently defined function bodies.
pub struct Executor {
    filename: String,
    interrupt: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(filename: String, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            filename,
            interrupt,
        }
    }

    pub fn run(&self, code: &str, scope: &Scope, stdin: String) -> ExecutionResult {
        let mut result = ExecutionResult {
            code: code.to_string(),
            stdin,
            ..Default::default()
        };

        let stmts = match parse(code) {
            Ok(stmts) => stmts,
            Err(err) => {
                self.record_error(&mut result, err);
                return result;
            }
        };

        let mut display_objects: Vec<Value> = Vec::new();
        let mut stdout = String::new();

        for stmt in &stmts {
            if self.interrupt.load(Ordering::Relaxed) {
                let err = PyError::interrupt().with_frame(stmt.line(), "<module>");
                result.stdout = stdout;
                self.record_error(&mut result, err);
                self.finish_display(&mut result, display_objects);
                return result;
            }
            let mut evaluator = Evaluator::new(&mut stdout, &self.interrupt);
            let outcome = match stmt {
                Stmt::Expr { value, .. } => evaluator.eval_expr(value, scope).map(|value| {
                    // display hook: every expression statement offers its
                    // value; only non-None values are retained
                    if !value.is_none() {
                        display_objects.push(value);
                    }
                    Flow::Normal
                }),
                other => evaluator.exec_stmt(other, scope),
            };

            match outcome {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(_)) => {
                    let err = PyError::syntax("'return' outside function", stmt.line());
                    result.stdout = stdout;
                    self.record_error(&mut result, err);
                    self.finish_display(&mut result, display_objects);
                    return result;
                }
                Ok(Flow::Break) | Ok(Flow::Continue) => {
                    let err = PyError::syntax("'break' outside loop", stmt.line());
                    result.stdout = stdout;
                    self.record_error(&mut result, err);
                    self.finish_display(&mut result, display_objects);
                    return result;
                }
                Err(err) => {
                    let err = err.with_frame(stmt.line(), "<module>");
                    result.stdout = stdout;
                    self.record_error(&mut result, err);
                    self.finish_display(&mut result, display_objects);
                    return result;
                }
            }

            // clobber globals with locals so imports and defs carry into
            // function scopes; interactive statements are module-level
            let promoted = std::mem::take(&mut *scope.locals.borrow_mut());
            scope.globals.borrow_mut().extend(promoted);
        }

        result.stdout = stdout;
        self.finish_display(&mut result, display_objects);
        result
    }

    fn finish_display(&self, result: &mut ExecutionResult, display_objects: Vec<Value>) {
        result.display_object = display_objects.into_iter().next_back();
    }

    fn record_error(&self, result: &mut ExecutionResult, err: PyError) {
        let traceback = err.traceback_lines(&self.filename);
        result.stderr.push_str(&traceback.join("\n"));
        result.stderr.push('\n');
        result.error = Some(ExecutionError {
            interrupted: err.is_interrupt(),
            ename: err.ename,
            evalue: err.evalue,
            traceback,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Namespace;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fresh_scope() -> Scope {
        Scope::new(
            Rc::new(RefCell::new(Namespace::new())),
            Rc::new(RefCell::new(Namespace::new())),
        )
    }

    fn executor() -> Executor {
        Executor::new("<input>".to_string(), Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn expression_value_is_displayed() {
        let scope = fresh_scope();
        let result = executor().run("1 + 2", &scope, String::new());
        assert!(result.error.is_none());
        assert_eq!(result.display_text().unwrap(), "3");
    }

    #[test]
    fn only_last_non_none_expression_is_kept() {
        let scope = fresh_scope();
        let result = executor().run("1\n2\nNone\n", &scope, String::new());
        assert_eq!(result.display_text().unwrap(), "2");
    }

    #[test]
    fn assignments_display_nothing() {
        let scope = fresh_scope();
        let result = executor().run("x = 5", &scope, String::new());
        assert!(result.display_object.is_none());
        assert!(scope.globals.borrow().contains_key("x"));
    }

    #[test]
    fn locals_promote_to_globals_per_statement() {
        let scope = fresh_scope();
        let result = executor().run("x = 1\ndef f(): return x", &scope, String::new());
        assert!(result.error.is_none());
        assert!(scope.locals.borrow().is_empty());
        assert!(scope.globals.borrow().contains_key("x"));
        assert!(scope.globals.borrow().contains_key("f"));

        let result = executor().run("f()", &scope, String::new());
        assert!(result.error.is_none());
        assert_eq!(result.display_text().unwrap(), "1");
    }

    #[test]
    fn syntax_error_runs_nothing() {
        let scope = fresh_scope();
        let result = executor().run("x = 1\n1 +* 2", &scope, String::new());
        assert_eq!(result.error.as_ref().unwrap().ename, "SyntaxError");
        // first statement never ran: parse failure precedes execution
        assert!(scope.globals.borrow().get("x").is_none());
    }

    #[test]
    fn runtime_error_stops_following_statements() {
        let scope = fresh_scope();
        let result = executor().run("a = 1\n1/0\nb = 2", &scope, String::new());
        let error = result.error.as_ref().unwrap();
        assert_eq!(error.ename, "ZeroDivisionError");
        assert!(scope.globals.borrow().contains_key("a"));
        assert!(!scope.globals.borrow().contains_key("b"));
        assert!(result.stderr.contains("ZeroDivisionError"));
        assert!(result.stderr.contains("Traceback"));
    }

    #[test]
    fn stdout_is_captured() {
        let scope = fresh_scope();
        let result = executor().run("print 'out'\n3", &scope, String::new());
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.display_text().unwrap(), "3");
    }

    #[test]
    fn interrupt_reports_keyboard_interrupt() {
        let interrupt = Arc::new(AtomicBool::new(true));
        let executor = Executor::new("<input>".to_string(), interrupt);
        let scope = fresh_scope();
        let result = executor.run("x = 1", &scope, String::new());
        let error = result.error.unwrap();
        assert_eq!(error.ename, "KeyboardInterrupt");
        assert!(error.interrupted);
    }
}
