//! Tree-walking evaluator.
//!
//! One `Evaluator` lives for the duration of a single `execute()` call; the
//! persistent state (globals, locals, history) is owned by the execution
//! context and threaded through as a `Scope`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use crate::errors::PyError;
use crate::interpreter::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, Target, UnaryOp};
use crate::interpreter::builtins;
use crate::interpreter::value::{
    ClassObj, DictKey, FunctionObj, HistoryKind, InstanceObj, Namespace, Value,
};

const MAX_CALL_DEPTH: usize = 100;

/// Statement outcome for control-flow propagation.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// The pair of binding tables a statement executes against.
///
/// At module level both tables belong to the execution context; inside a
/// function call `locals` is the fresh call frame and `globals` is the
/// defining module's table.
#[derive(Clone)]
pub struct Scope {
    pub globals: Rc<RefCell<Namespace>>,
    pub locals: Rc<RefCell<Namespace>>,
}

impl Scope {
    pub fn new(globals: Rc<RefCell<Namespace>>, locals: Rc<RefCell<Namespace>>) -> Self {
        Self { globals, locals }
    }
}

pub struct Evaluator<'a> {
    /// Captured stdout for `print`.
    pub stdout: &'a mut String,
    interrupt: &'a Arc<AtomicBool>,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(stdout: &'a mut String, interrupt: &'a Arc<AtomicBool>) -> Self {
        Self {
            stdout,
            interrupt,
            depth: 0,
        }
    }

    fn check_interrupt(&self) -> Result<(), PyError> {
        if self.interrupt.load(AtomicOrdering::Relaxed) {
            Err(PyError::interrupt())
        } else {
            Ok(())
        }
    }

    pub fn exec_block(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<Flow, PyError> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Flow, PyError> {
        match stmt {
            Stmt::Expr { value, .. } => {
                self.eval_expr(value, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value, .. } => {
                let value = self.eval_expr(value, scope)?;
                self.assign(target, value, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::AugAssign {
                target, op, value, ..
            } => {
                let current = self.read_target(target, scope)?;
                let operand = self.eval_expr(value, scope)?;
                let updated = binary_op(&current, *op, &operand)?;
                self.assign(target, updated, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { values, .. } => {
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    parts.push(self.eval_expr(value, scope)?.display());
                }
                self.stdout.push_str(&parts.join(" "));
                self.stdout.push('\n');
                Ok(Flow::Normal)
            }
            Stmt::Del { names, .. } => {
                for name in names {
                    let removed = scope.locals.borrow_mut().remove(name).is_some()
                        || scope.globals.borrow_mut().remove(name).is_some();
                    if !removed {
                        return Err(PyError::name_error(name));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Import { module, alias, .. } => {
                let value = builtins::import_module(module)?;
                let binding = alias.clone().unwrap_or_else(|| module.clone());
                scope.locals.borrow_mut().insert(binding, value);
                Ok(Flow::Normal)
            }
            Stmt::Def {
                name, params, body, ..
            } => {
                let mut defaults = Vec::new();
                for param in params {
                    if let Some(default) = &param.default {
                        defaults.push(self.eval_expr(default, scope)?);
                    }
                }
                let func = Value::Function(Rc::new(FunctionObj {
                    name: name.clone(),
                    params: params.iter().map(|p| p.name.clone()).collect(),
                    defaults,
                    body: Rc::new(body.clone()),
                    globals: scope.globals.clone(),
                }));
                scope.locals.borrow_mut().insert(name.clone(), func);
                Ok(Flow::Normal)
            }
            Stmt::Class { name, body, .. } => {
                let class_scope = Scope::new(
                    scope.globals.clone(),
                    Rc::new(RefCell::new(Namespace::new())),
                );
                self.exec_block(body, &class_scope)?;
                let attrs = class_scope.locals.borrow().clone();
                let class = Value::Class(Rc::new(ClassObj {
                    name: name.clone(),
                    attrs: RefCell::new(attrs),
                }));
                scope.locals.borrow_mut().insert(name.clone(), class);
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                branches, orelse, ..
            } => {
                for (test, suite) in branches {
                    if self.eval_expr(test, scope)?.truthy() {
                        return self.exec_block(suite, scope);
                    }
                }
                self.exec_block(orelse, scope)
            }
            Stmt::While { test, body, .. } => {
                while self.eval_expr(test, scope)?.truthy() {
                    self.check_interrupt()?;
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                target, iter, body, ..
            } => {
                let items = builtins::iterate(&self.eval_expr(iter, scope)?)?;
                for item in items {
                    self.check_interrupt()?;
                    scope.locals.borrow_mut().insert(target.clone(), item);
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Pass { .. } => Ok(Flow::Normal),
        }
    }

    fn assign(&mut self, target: &Target, value: Value, scope: &Scope) -> Result<(), PyError> {
        match target {
            Target::Name(name) => {
                scope.locals.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Target::Attribute(object, attr) => {
                let object = self.eval_expr(object, scope)?;
                builtins::set_attribute(&object, attr, value)
            }
            Target::Index(object, index) => {
                let object = self.eval_expr(object, scope)?;
                let index = self.eval_expr(index, scope)?;
                set_item(&object, &index, value)
            }
        }
    }

    fn read_target(&mut self, target: &Target, scope: &Scope) -> Result<Value, PyError> {
        match target {
            Target::Name(name) => self.lookup(name, scope),
            Target::Attribute(object, attr) => {
                let object = self.eval_expr(object, scope)?;
                builtins::get_attribute(&object, attr)
            }
            Target::Index(object, index) => {
                let object = self.eval_expr(object, scope)?;
                let index = self.eval_expr(index, scope)?;
                get_item(&object, &index)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value, PyError> {
        if let Some(value) = scope.locals.borrow().get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = scope.globals.borrow().get(name) {
            return Ok(value.clone());
        }
        builtins::lookup_builtin(name).ok_or_else(|| PyError::name_error(name))
    }

    pub fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, PyError> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::True => Ok(Value::Bool(true)),
            Expr::False => Ok(Value::Bool(false)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s.clone())),
            Expr::Name(name) => self.lookup(name, scope),
            Expr::List(items) => {
                let values: Vec<Value> = items
                    .iter()
                    .map(|item| self.eval_expr(item, scope))
                    .collect::<Result<_, _>>()?;
                Ok(Value::list(values))
            }
            Expr::Tuple(items) => {
                let values: Vec<Value> = items
                    .iter()
                    .map(|item| self.eval_expr(item, scope))
                    .collect::<Result<_, _>>()?;
                Ok(Value::Tuple(Rc::new(values)))
            }
            Expr::Dict(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = DictKey::from_value(&self.eval_expr(key, scope)?)?;
                    map.insert(key, self.eval_expr(value, scope)?);
                }
                Ok(Value::dict(map))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, scope)?;
                unary_op(*op, &value)
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                binary_op(&left, *op, &right)
            }
            Expr::BoolOp { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                match op {
                    BoolOp::And => {
                        if left.truthy() {
                            self.eval_expr(right, scope)
                        } else {
                            Ok(left)
                        }
                    }
                    BoolOp::Or => {
                        if left.truthy() {
                            Ok(left)
                        } else {
                            self.eval_expr(right, scope)
                        }
                    }
                }
            }
            Expr::Compare { left, ops } => {
                let mut current = self.eval_expr(left, scope)?;
                for (op, right) in ops {
                    let right = self.eval_expr(right, scope)?;
                    if !compare_op(&current, *op, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call { func, args } => {
                let func = self.eval_expr(func, scope)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, scope)?);
                }
                self.call_value(&func, values)
            }
            Expr::Attribute { value, attr } => {
                let value = self.eval_expr(value, scope)?;
                builtins::get_attribute(&value, attr)
            }
            Expr::Index { value, index } => {
                let value = self.eval_expr(value, scope)?;
                let index = self.eval_expr(index, scope)?;
                get_item(&value, &index)
            }
        }
    }

    pub fn call_value(&mut self, func: &Value, args: Vec<Value>) -> Result<Value, PyError> {
        match func {
            Value::Builtin(def) => (def.func)(args),
            Value::Method(binding) => builtins::call_method(&binding.recv, binding.name, args),
            Value::Function(func) => self.call_function(func, args),
            Value::BoundMethod(bound) => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(bound.recv.clone());
                all.extend(args);
                self.call_function(&bound.func, all)
            }
            Value::Class(class) => {
                let instance = Value::Instance(Rc::new(InstanceObj {
                    class: class.clone(),
                    attrs: RefCell::new(Namespace::new()),
                }));
                let init = class.attrs.borrow().get("__init__").cloned();
                if let Some(Value::Function(init)) = init {
                    let mut all = Vec::with_capacity(args.len() + 1);
                    all.push(instance.clone());
                    all.extend(args);
                    self.call_function(&init, all)?;
                } else if !args.is_empty() {
                    return Err(PyError::type_error(format!(
                        "this constructor takes no arguments ({} given)",
                        args.len()
                    )));
                }
                Ok(instance)
            }
            other => Err(PyError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, func: &Rc<FunctionObj>, args: Vec<Value>) -> Result<Value, PyError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(PyError::new(
                "RuntimeError",
                "maximum recursion depth exceeded",
            ));
        }
        let required = func.params.len() - func.defaults.len();
        if args.len() < required || args.len() > func.params.len() {
            return Err(PyError::type_error(format!(
                "{}() takes {} arguments ({} given)",
                func.name,
                func.params.len(),
                args.len()
            )));
        }
        let locals = Rc::new(RefCell::new(Namespace::new()));
        {
            let mut frame = locals.borrow_mut();
            for (index, name) in func.params.iter().enumerate() {
                let value = if index < args.len() {
                    args[index].clone()
                } else {
                    func.defaults[index - required].clone()
                };
                frame.insert(name.clone(), value);
            }
        }
        let scope = Scope::new(func.globals.clone(), locals);
        self.depth += 1;
        let mut outcome = Flow::Normal;
        let mut failure = None;
        for stmt in func.body.iter() {
            match self.exec_stmt(stmt, &scope) {
                Ok(Flow::Normal) => {}
                Ok(flow) => {
                    outcome = flow;
                    break;
                }
                Err(err) => {
                    failure = Some(err.with_frame(stmt.line(), &func.name));
                    break;
                }
            }
        }
        self.depth -= 1;
        if let Some(err) = failure {
            return Err(err);
        }
        match outcome {
            Flow::Return(value) => Ok(value),
            Flow::Break | Flow::Continue => Err(PyError::syntax("'break' outside loop", 0)),
            Flow::Normal => Ok(Value::None),
        }
    }
}

// --- operator semantics ---

fn unary_op(op: UnaryOp, value: &Value) -> Result<Value, PyError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Pos => match value {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(value.clone()),
            other => Err(PyError::type_error(format!(
                "bad operand type for unary +: '{}'",
                other.type_name()
            ))),
        },
        UnaryOp::Neg => match value {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            other => Err(PyError::type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
    }
}

fn type_error_for(op: BinOp, a: &Value, b: &Value) -> PyError {
    let symbol = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    };
    PyError::type_error(format!(
        "unsupported operand type(s) for {symbol}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

/// Integer floor division/modulo with Python's sign rules.
fn int_floordiv(a: i64, b: i64) -> Result<i64, PyError> {
    if b == 0 {
        return Err(PyError::zero_division("integer division or modulo by zero"));
    }
    let quotient = a / b;
    let remainder = a % b;
    Ok(if remainder != 0 && (remainder < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    })
}

fn int_mod(a: i64, b: i64) -> Result<i64, PyError> {
    if b == 0 {
        return Err(PyError::zero_division("integer division or modulo by zero"));
    }
    let remainder = a % b;
    Ok(if remainder != 0 && (remainder < 0) != (b < 0) {
        remainder + b
    } else {
        remainder
    })
}

pub fn binary_op(a: &Value, op: BinOp, b: &Value) -> Result<Value, PyError> {
    // sequence and string operators first
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            return Ok(Value::str(format!("{x}{y}")));
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            return Ok(Value::list(items));
        }
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            let mut items = x.as_ref().clone();
            items.extend(y.iter().cloned());
            return Ok(Value::Tuple(Rc::new(items)));
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::str(s.repeat((*n).max(0) as usize)));
        }
        (BinOp::Mul, Value::List(items), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
            let mut out = Vec::new();
            for _ in 0..(*n).max(0) {
                out.extend(items.borrow().iter().cloned());
            }
            return Ok(Value::list(out));
        }
        _ => {}
    }

    // numeric tower: ints stay ints (py2 division included), floats contaminate
    let ints = (a.as_int(), b.as_int());
    if let (Some(x), Some(y)) = ints
        && !matches!(a, Value::Float(_))
        && !matches!(b, Value::Float(_))
    {
        return match op {
            BinOp::Add => Ok(Value::Int(x.wrapping_add(y))),
            BinOp::Sub => Ok(Value::Int(x.wrapping_sub(y))),
            BinOp::Mul => Ok(Value::Int(x.wrapping_mul(y))),
            BinOp::Div | BinOp::FloorDiv => int_floordiv(x, y).map(Value::Int),
            BinOp::Mod => int_mod(x, y).map(Value::Int),
            BinOp::Pow => {
                if y < 0 {
                    Ok(Value::Float((x as f64).powf(y as f64)))
                } else {
                    match x.checked_pow(y.min(u32::MAX as i64) as u32) {
                        Some(value) if y <= u32::MAX as i64 => Ok(Value::Int(value)),
                        _ => Ok(Value::Float((x as f64).powf(y as f64))),
                    }
                }
            }
        };
    }

    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => match op {
            BinOp::Add => Ok(Value::Float(x + y)),
            BinOp::Sub => Ok(Value::Float(x - y)),
            BinOp::Mul => Ok(Value::Float(x * y)),
            BinOp::Div => {
                if y == 0.0 {
                    Err(PyError::zero_division("float division"))
                } else {
                    Ok(Value::Float(x / y))
                }
            }
            BinOp::FloorDiv => {
                if y == 0.0 {
                    Err(PyError::zero_division("float division"))
                } else {
                    Ok(Value::Float((x / y).floor()))
                }
            }
            BinOp::Mod => {
                if y == 0.0 {
                    Err(PyError::zero_division("float modulo"))
                } else {
                    let r = x % y;
                    Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) {
                        r + y
                    } else {
                        r
                    }))
                }
            }
            BinOp::Pow => Ok(Value::Float(x.powf(y))),
        },
        _ => Err(type_error_for(op, a, b)),
    }
}

fn py_is(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y),
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn compare_op(a: &Value, op: CmpOp, b: &Value) -> Result<bool, PyError> {
    use std::cmp::Ordering;
    Ok(match op {
        CmpOp::Eq => a.py_eq(b),
        CmpOp::Ne => !a.py_eq(b),
        CmpOp::Lt => builtins::py_compare(a, b)? == Ordering::Less,
        CmpOp::Le => builtins::py_compare(a, b)? != Ordering::Greater,
        CmpOp::Gt => builtins::py_compare(a, b)? == Ordering::Greater,
        CmpOp::Ge => builtins::py_compare(a, b)? != Ordering::Less,
        CmpOp::In => builtins::contains(b, a)?,
        CmpOp::NotIn => !builtins::contains(b, a)?,
        CmpOp::Is => py_is(a, b),
        CmpOp::IsNot => !py_is(a, b),
    })
}

// --- subscripting ---

pub fn get_item(value: &Value, index: &Value) -> Result<Value, PyError> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let i = sequence_index(index, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = sequence_index(index, items.len(), "tuple")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = sequence_index(index, chars.len(), "string")?;
            Ok(Value::str(chars[i].to_string()))
        }
        Value::Dict(entries) => {
            let key = DictKey::from_value(index)?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| PyError::key_error(&key.repr()))
        }
        Value::History(kind, store) => {
            let raw = index.as_int().ok_or_else(|| {
                PyError::type_error("history indices must be integers")
            })?;
            let store = store.borrow();
            let n = store
                .resolve_index(raw)
                .ok_or_else(|| PyError::key_error(&raw.to_string()))?;
            let (code, display) = &store.cells[&n];
            Ok(match kind {
                HistoryKind::Input => Value::str(code.as_ref().clone()),
                HistoryKind::Output => display.clone(),
            })
        }
        other => Err(PyError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(value: &Value, index: &Value, new_value: Value) -> Result<(), PyError> {
    match value {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = sequence_index(index, items.len(), "list")?;
            items[i] = new_value;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = DictKey::from_value(index)?;
            entries.borrow_mut().insert(key, new_value);
            Ok(())
        }
        other => Err(PyError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn sequence_index(index: &Value, len: usize, kind: &str) -> Result<usize, PyError> {
    let raw = index.as_int().ok_or_else(|| {
        PyError::type_error(format!(
            "{kind} indices must be integers, not {}",
            index.type_name()
        ))
    })?;
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved as usize >= len {
        return Err(PyError::index_error(format!("{kind} index out of range")));
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::parser::parse;

    fn run(code: &str) -> (Scope, String) {
        let scope = Scope::new(
            Rc::new(RefCell::new(Namespace::new())),
            Rc::new(RefCell::new(Namespace::new())),
        );
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let stmts = parse(code).unwrap();
        for stmt in &stmts {
            eval.exec_stmt(stmt, &scope).unwrap();
        }
        (scope, stdout)
    }

    fn eval_one(code: &str) -> Value {
        let scope = Scope::new(
            Rc::new(RefCell::new(Namespace::new())),
            Rc::new(RefCell::new(Namespace::new())),
        );
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let stmts = parse(code).unwrap();
        match &stmts[0] {
            Stmt::Expr { value, .. } => eval.eval_expr(value, &scope).unwrap(),
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_follows_python2() {
        assert!(eval_one("1 + 2").py_eq(&Value::Int(3)));
        assert!(eval_one("7 / 2").py_eq(&Value::Int(3)));
        assert!(eval_one("-7 / 2").py_eq(&Value::Int(-4)));
        assert!(eval_one("-7 % 3").py_eq(&Value::Int(2)));
        assert!(eval_one("2 ** 10").py_eq(&Value::Int(1024)));
        assert!(eval_one("7.0 / 2").py_eq(&Value::Float(3.5)));
    }

    #[test]
    fn division_by_zero_raises() {
        let scope = Scope::new(
            Rc::new(RefCell::new(Namespace::new())),
            Rc::new(RefCell::new(Namespace::new())),
        );
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let stmts = parse("1/0").unwrap();
        let err = match &stmts[0] {
            Stmt::Expr { value, .. } => eval.eval_expr(value, &scope).unwrap_err(),
            _ => unreachable!(),
        };
        assert_eq!(err.ename, "ZeroDivisionError");
        assert_eq!(err.evalue, "integer division or modulo by zero");
    }

    #[test]
    fn print_writes_to_captured_stdout() {
        let (_, stdout) = run("print 'hello', 42");
        assert_eq!(stdout, "hello 42\n");
    }

    #[test]
    fn functions_close_over_globals() {
        let (scope, _) = run("def f(a, b=10): return a + b");
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let f = scope.locals.borrow().get("f").cloned().unwrap();
        let result = eval.call_value(&f, vec![Value::Int(1)]).unwrap();
        assert!(result.py_eq(&Value::Int(11)));
        let result = eval.call_value(&f, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert!(result.py_eq(&Value::Int(3)));
        let err = eval.call_value(&f, vec![]).unwrap_err();
        assert_eq!(err.ename, "TypeError");
    }

    #[test]
    fn control_flow_and_loops() {
        let (scope, _) = run("total = 0\nfor i in range(5):\n    if i == 3:\n        continue\n    total += i");
        let total = scope.locals.borrow().get("total").cloned().unwrap();
        assert!(total.py_eq(&Value::Int(0 + 1 + 2 + 4)));
    }

    #[test]
    fn while_loop_with_break() {
        let (scope, _) = run("n = 0\nwhile True:\n    n += 1\n    if n >= 3:\n        break");
        let n = scope.locals.borrow().get("n").cloned().unwrap();
        assert!(n.py_eq(&Value::Int(3)));
    }

    #[test]
    fn classes_and_bound_methods() {
        let code = "class Point:\n    def __init__(self, x, y):\n        self.x = x\n        self.y = y\n    def norm1(self):\n        return abs(self.x) + abs(self.y)\np = Point(3, -4)\nd = p.norm1()";
        let (scope, _) = run(code);
        let d = scope.locals.borrow().get("d").cloned().unwrap();
        assert!(d.py_eq(&Value::Int(7)));
    }

    #[test]
    fn interrupt_stops_loops() {
        let scope = Scope::new(
            Rc::new(RefCell::new(Namespace::new())),
            Rc::new(RefCell::new(Namespace::new())),
        );
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(true));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let stmts = parse("while True: pass").unwrap();
        let err = eval.exec_stmt(&stmts[0], &scope).unwrap_err();
        assert_eq!(err.ename, "KeyboardInterrupt");
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let (scope, _) = run("def f(): return f()");
        let f = scope.locals.borrow().get("f").cloned().unwrap();
        // recursive reference resolves through the defining globals
        scope.globals.borrow_mut().insert("f".to_string(), f.clone());
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let err = eval.call_value(&f, vec![]).unwrap_err();
        assert_eq!(err.ename, "RuntimeError");
    }

    #[test]
    fn error_inside_function_collects_frames() {
        let (scope, _) = run("def f():\n    return 1/0");
        let mut stdout = String::new();
        let interrupt = Arc::new(AtomicBool::new(false));
        let mut eval = Evaluator::new(&mut stdout, &interrupt);
        let f = scope.locals.borrow().get("f").cloned().unwrap();
        let err = eval.call_value(&f, vec![]).unwrap_err();
        assert_eq!(err.ename, "ZeroDivisionError");
        assert_eq!(err.frames.len(), 1);
        assert_eq!(err.frames[0].scope, "f");
    }

    #[test]
    fn import_math() {
        let (scope, _) = run("import math\nr = math.sqrt(16.0)");
        let r = scope.locals.borrow().get("r").cloned().unwrap();
        assert!(r.py_eq(&Value::Float(4.0)));
    }

    #[test]
    fn subscripts_and_dicts() {
        let (scope, _) = run("d = {'a': 1}\nd['b'] = 2\nx = d['b']\nl = [10, 20]\ny = l[-1]");
        assert!(scope.locals.borrow().get("x").unwrap().py_eq(&Value::Int(2)));
        assert!(scope.locals.borrow().get("y").unwrap().py_eq(&Value::Int(20)));
    }

    #[test]
    fn chained_comparison_short_circuits() {
        assert!(eval_one("1 < 2 < 3").py_eq(&Value::Bool(true)));
        assert!(eval_one("1 < 2 > 5").py_eq(&Value::Bool(false)));
        assert!(eval_one("'a' in 'cab'").py_eq(&Value::Bool(true)));
        assert!(eval_one("3 not in [1, 2]").py_eq(&Value::Bool(true)));
    }
}
