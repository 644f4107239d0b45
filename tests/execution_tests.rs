//! Session-level behavior: counting, history, promotion, completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ignition_kernel::execution::ExecutionContext;
use ignition_kernel::execution::coding::{get_identifier_at_cursor, match_references};

fn session() -> ExecutionContext {
    ExecutionContext::new(Arc::new(AtomicBool::new(false)))
}

#[test]
fn execution_count_counts_stored_runs_only() {
    let mut ctx = session();
    ctx.execute("1", true);
    ctx.execute("2", false);
    ctx.execute("3", true);
    ctx.execute("bogus +* syntax", true);
    assert_eq!(ctx.execution_count, 3);
    ctx.execute("4", false);
    assert_eq!(ctx.execution_count, 3);
}

#[test]
fn simple_arithmetic_displays_result() {
    let mut ctx = session();
    let result = ctx.execute("1+2", true);
    assert!(result.error.is_none());
    assert_eq!(result.display_text().unwrap(), "3");
    assert_eq!(ctx.execution_count, 1);
}

#[test]
fn division_by_zero_surfaces_as_execution_error() {
    let mut ctx = session();
    let result = ctx.execute("1/0", true);
    let error = result.error.as_ref().unwrap();
    assert_eq!(error.ename, "ZeroDivisionError");
    assert!(!error.interrupted);
    assert!(
        error
            .traceback
            .iter()
            .any(|line| line.contains("ZeroDivisionError"))
    );
    assert!(result.stderr.contains("ZeroDivisionError"));
}

#[test]
fn globals_promotion_feeds_later_function_calls() {
    let mut ctx = session();
    let first = ctx.execute("x = 1\ndef f(): return x", true);
    assert!(first.error.is_none(), "{:?}", first.error);
    let second = ctx.execute("f()", true);
    assert!(second.error.is_none(), "{:?}", second.error);
    assert_eq!(second.display_text().unwrap(), "1");
}

#[test]
fn redefinition_at_prompt_wins() {
    let mut ctx = session();
    ctx.execute("x = 1\ndef f(): return x", true);
    ctx.execute("x = 99", true);
    let result = ctx.execute("f()", true);
    assert_eq!(result.display_text().unwrap(), "99");
}

#[test]
fn stdout_and_display_are_separate() {
    let mut ctx = session();
    let result = ctx.execute("print 'side effect'\n40 + 2", true);
    assert_eq!(result.stdout, "side effect\n");
    assert_eq!(result.display_text().unwrap(), "42");
}

#[test]
fn history_shims_and_negative_indices() {
    let mut ctx = session();
    ctx.execute("5 * 5", true);
    ctx.execute("6 * 6", true);
    let via_in = ctx.execute("In[-2]", true);
    assert_eq!(via_in.display_text().unwrap(), "'5 * 5'");
    let via_out = ctx.execute("Out[2]", true);
    assert_eq!(via_out.display_text().unwrap(), "36");
}

#[test]
fn tracebacks_carry_the_synthetic_cell_filename() {
    let mut ctx = session();
    ctx.execute("pass", true);
    let result = ctx.execute("1/0", true);
    let error = result.error.unwrap();
    // second stored cell: the location names In[2]
    assert!(
        error
            .traceback
            .iter()
            .any(|line| line.contains("<Jupyter In[2]>")),
        "{:?}",
        error.traceback
    );
}

#[test]
fn interrupt_flag_aborts_between_statements() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut ctx = ExecutionContext::new(flag.clone());
    flag.store(true, Ordering::Relaxed);
    let result = ctx.execute("x = 1", true);
    let error = result.error.unwrap();
    assert_eq!(error.ename, "KeyboardInterrupt");
    assert!(error.interrupted);
}

#[test]
fn completion_prefers_scope_names() {
    let mut ctx = session();
    ctx.execute("ab = 1; ac = 2", true);
    let code = "ab = 1; ac = 2; a";
    let cursor = code.len();
    let identifier = get_identifier_at_cursor(code, cursor, false, true);
    assert_eq!(identifier, "a");
    let matches = match_references(&identifier, &ctx.scope(), true);
    assert_eq!(matches, vec!["ab".to_string(), "ac".to_string()]);
    assert_eq!(cursor - identifier.chars().count(), 16);
}

#[test]
fn completion_walks_attributes() {
    let mut ctx = session();
    ctx.execute("greeting = 'hello'", true);
    let matches = match_references("greeting.s", &ctx.scope(), true);
    assert!(matches.contains(&"greeting.split".to_string()));
    assert!(matches.contains(&"greeting.startswith".to_string()));
    assert!(matches.contains(&"greeting.strip".to_string()));
    assert!(!matches.iter().any(|m| m.ends_with(".upper")));
}

#[test]
fn completion_on_dict_subscript_returns_keys() {
    let mut ctx = session();
    ctx.execute("table = {'first': 1, 'second': 2}", true);
    let code = "table[";
    let identifier = get_identifier_at_cursor(code, code.len(), false, true);
    assert_eq!(identifier, "table");
    let matches = match_references(&identifier, &ctx.scope(), true);
    assert_eq!(matches, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn class_state_survives_cells() {
    let mut ctx = session();
    let define = ctx.execute(
        "class Counter:\n    def __init__(self):\n        self.n = 0\n    def bump(self):\n        self.n = self.n + 1\n        return self.n",
        true,
    );
    assert!(define.error.is_none(), "{:?}", define.error);
    ctx.execute("c = Counter()", true);
    ctx.execute("c.bump()", true);
    let result = ctx.execute("c.bump()", true);
    assert_eq!(result.display_text().unwrap(), "2");
}
