//! The per-session execution context: persistent scope, history, and the
//! `In`/`Out` shims.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use uuid::Uuid;

use crate::execution::results::ExecutionResult;
use crate::execution::run::Executor;
use crate::interpreter::value::{HistoryKind, SessionHistory, Value};
use crate::interpreter::{Namespace, Scope};

/// A single kernel session's interpreter state.
///
/// Exactly one of these is alive per kernel; restart replaces it wholesale
/// (fresh id, fresh scope, count back to zero) while the kernel's sockets
/// stay bound.
pub struct ExecutionContext {
    pub id: String,
    pub execution_count: u32,
    pub history: BTreeMap<u32, ExecutionResult>,
    globals: Rc<RefCell<Namespace>>,
    locals: Rc<RefCell<Namespace>>,
    shim_history: Rc<RefCell<SessionHistory>>,
    interrupt: Arc<AtomicBool>,
    /// Text queued from the stdin channel for the next execution.
    pending_stdin: String,
}

impl ExecutionContext {
    pub fn new(interrupt: Arc<AtomicBool>) -> Self {
        let shim_history = Rc::new(RefCell::new(SessionHistory::default()));
        let locals: Rc<RefCell<Namespace>> = Rc::new(RefCell::new(Namespace::new()));
        // IPython-style helpers live in locals so user rebindings win
        locals.borrow_mut().insert(
            "In".to_string(),
            Value::History(HistoryKind::Input, shim_history.clone()),
        );
        locals.borrow_mut().insert(
            "Out".to_string(),
            Value::History(HistoryKind::Output, shim_history.clone()),
        );
        Self {
            id: Uuid::new_v4().to_string(),
            execution_count: 0,
            history: BTreeMap::new(),
            globals: Rc::new(RefCell::new(Namespace::new())),
            locals,
            shim_history,
            interrupt,
            pending_stdin: String::new(),
        }
    }

    /// Synthetic filename shown in tracebacks for the *next* execution.
    pub fn execution_location(&self) -> String {
        format!("<Jupyter In[{}]>", self.execution_count + 1)
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.globals.clone(), self.locals.clone())
    }

    /// Queue text for the next run's stdin buffer.
    pub fn push_stdin(&mut self, text: &str) {
        self.pending_stdin.push_str(text);
    }

    /// Run one cell. History and the execution counter advance only when
    /// `store_history` is set.
    pub fn execute(&mut self, code: &str, store_history: bool) -> ExecutionResult {
        let executor = Executor::new(self.execution_location(), self.interrupt.clone());
        let stdin = std::mem::take(&mut self.pending_stdin);
        let result = executor.run(code, &self.scope(), stdin);

        if store_history {
            self.execution_count += 1;
            self.history.insert(self.execution_count, result.clone());
            let mut shim = self.shim_history.borrow_mut();
            shim.count = self.execution_count;
            shim.cells.insert(
                self.execution_count,
                (
                    Rc::new(result.code.clone()),
                    result.display_object.clone().unwrap_or(Value::None),
                ),
            );
        }
        result
    }

    /// History access with negative indexing, `-1` being the most recent.
    pub fn result(&self, index: i64) -> Option<&ExecutionResult> {
        let n = if index < 0 {
            let absolute = self.execution_count as i64 + index + 1;
            if absolute < 1 {
                return None;
            }
            absolute as u32
        } else {
            n_from(index)?
        };
        self.history.get(&n)
    }

    /// Read-only views for completion and inspection.
    pub fn globals_ref(&self) -> Rc<RefCell<Namespace>> {
        self.globals.clone()
    }

    pub fn locals_ref(&self) -> Rc<RefCell<Namespace>> {
        self.locals.clone()
    }

    /// Drop all bindings; called at kernel tear-down.
    pub fn destroy(&mut self) {
        self.globals.borrow_mut().clear();
        self.locals.borrow_mut().clear();
        self.history.clear();
        self.shim_history.borrow_mut().cells.clear();
    }
}

fn n_from(index: i64) -> Option<u32> {
    u32::try_from(index).ok()
}
