//! Runtime value model for the interactive execution context.
//!
//! Values are cheaply clonable handles; mutable containers share their
//! backing store through `Rc<RefCell<..>>`. The model is deliberately
//! single-threaded: every value lives and dies on its kernel's overwatch
//! thread.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::PyError;
use crate::interpreter::ast::Stmt;

/// A string-keyed binding table (module globals, call locals, object attrs).
pub type Namespace = BTreeMap<String, Value>;

/// Signature of a native builtin callable.
pub type BuiltinFunc = fn(Vec<Value>) -> Result<Value, PyError>;

/// A native function exposed in the builtin scope or a builtin module.
pub struct BuiltinDef {
    pub name: &'static str,
    pub func: BuiltinFunc,
}

/// User-defined function: parameters, body, and the defining module globals.
pub struct FunctionObj {
    pub name: String,
    pub params: Vec<String>,
    /// Default values for the trailing parameters, evaluated at `def` time.
    pub defaults: Vec<Value>,
    pub body: Rc<Vec<Stmt>>,
    pub globals: Rc<RefCell<Namespace>>,
}

pub struct ClassObj {
    pub name: String,
    pub attrs: RefCell<Namespace>,
}

pub struct InstanceObj {
    pub class: Rc<ClassObj>,
    pub attrs: RefCell<Namespace>,
}

pub struct ModuleObj {
    pub name: String,
    pub attrs: Namespace,
}

/// A builtin method bound to its receiver, e.g. `"a,b".split`.
pub struct MethodBinding {
    pub recv: Value,
    pub name: &'static str,
}

/// A user-defined function bound to an instance receiver.
pub struct BoundMethodObj {
    pub func: Rc<FunctionObj>,
    pub recv: Value,
}

/// Dict keys are restricted to the hashable primitives the kernel needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DictKey {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl DictKey {
    pub fn from_value(value: &Value) -> Result<Self, PyError> {
        match value {
            Value::Bool(b) => Ok(DictKey::Bool(*b)),
            Value::Int(n) => Ok(DictKey::Int(*n)),
            Value::Str(s) => Ok(DictKey::Str(s.as_ref().clone())),
            other => Err(PyError::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(n) => Value::Int(*n),
            DictKey::Str(s) => Value::str(s.clone()),
        }
    }

    pub fn repr(&self) -> String {
        self.to_value().repr()
    }
}

/// Which side of the `In`/`Out` history pair a shim reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Input,
    Output,
}

/// Shared record of executed cells backing the `In[n]`/`Out[n]` shims.
#[derive(Default)]
pub struct SessionHistory {
    /// execution_count -> (source code, display object)
    pub cells: BTreeMap<u32, (Rc<String>, Value)>,
    pub count: u32,
}

impl SessionHistory {
    /// Resolve an index the IPython way: negatives count back from the
    /// most recent entry (`-1` is the current count).
    pub fn resolve_index(&self, index: i64) -> Option<u32> {
        let n = if index < 0 {
            let absolute = self.count as i64 + index + 1;
            if absolute < 1 {
                return None;
            }
            absolute as u32
        } else {
            index as u32
        };
        self.cells.contains_key(&n).then_some(n)
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<BTreeMap<DictKey, Value>>>),
    Function(Rc<FunctionObj>),
    Builtin(&'static BuiltinDef),
    Method(Rc<MethodBinding>),
    BoundMethod(Rc<BoundMethodObj>),
    Class(Rc<ClassObj>),
    Instance(Rc<InstanceObj>),
    Module(Rc<ModuleObj>),
    /// Lazy history accessor (`In` or `Out`) injected into the session scope.
    History(HistoryKind, Rc<RefCell<SessionHistory>>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: BTreeMap<DictKey, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "builtin_function_or_method",
            Value::BoundMethod(_) => "instancemethod",
            Value::Class(_) => "classobj",
            Value::Instance(_) => "instance",
            Value::Module(_) => "module",
            Value::History(..) => "ResultHistory",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Structural equality with Python's cross-type numeric rules.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.py_eq(w)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Python `repr()`: strings quoted, containers element-wise.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::List(items) => {
                let inner: Vec<String> = items.borrow().iter().map(|v| v.repr()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.repr()).collect();
                if items.len() == 1 {
                    format!("({},)", inner[0])
                } else {
                    format!("({})", inner.join(", "))
                }
            }
            Value::Dict(entries) => {
                let inner: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.name),
            Value::Builtin(b) => format!("<built-in function {}>", b.name),
            Value::Method(m) => format!(
                "<built-in method {} of {} object>",
                m.name,
                m.recv.type_name()
            ),
            Value::BoundMethod(m) => format!("<bound method {}>", m.func.name),
            Value::Class(c) => format!("<class {}>", c.name),
            Value::Instance(i) => format!("<{} instance>", i.class.name),
            Value::Module(m) => format!("<module '{}'>", m.name),
            Value::History(kind, _) => match kind {
                HistoryKind::Input => "<input history>".to_string(),
                HistoryKind::Output => "<output history>".to_string(),
            },
        }
    }

    /// Python `str()`: like `repr()` except bare strings.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.as_ref().clone(),
            other => other.repr(),
        }
    }
}

/// Float formatting the CPython way: always show a decimal point.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{f}");
    if s.contains('.') || s.contains('e') {
        s
    } else {
        format!("{s}.0")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_quotes_strings_and_formats_floats() {
        assert_eq!(Value::str("hi").repr(), "'hi'");
        assert_eq!(Value::Float(1.0).repr(), "1.0");
        assert_eq!(Value::Float(2.5).repr(), "2.5");
        assert_eq!(Value::Int(3).repr(), "3");
        assert_eq!(Value::None.repr(), "None");
    }

    #[test]
    fn display_leaves_strings_bare() {
        assert_eq!(Value::str("hi").display(), "hi");
        assert_eq!(Value::Bool(true).display(), "True");
    }

    #[test]
    fn container_repr_is_elementwise() {
        let list = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(list.repr(), "[1, 'a']");
        let mut entries = BTreeMap::new();
        entries.insert(DictKey::Str("k".into()), Value::Int(2));
        assert_eq!(Value::dict(entries).repr(), "{'k': 2}");
        let tup = Value::Tuple(Rc::new(vec![Value::Int(1)]));
        assert_eq!(tup.repr(), "(1,)");
    }

    #[test]
    fn truthiness_follows_python() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::str("").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(Value::Int(-1).truthy());
        assert!(Value::str("x").truthy());
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(!Value::Int(1).py_eq(&Value::str("1")));
    }

    #[test]
    fn history_resolves_negative_indices() {
        let mut history = SessionHistory::default();
        history.cells.insert(1, (Rc::new("a".into()), Value::Int(1)));
        history.cells.insert(2, (Rc::new("b".into()), Value::Int(2)));
        history.count = 2;
        assert_eq!(history.resolve_index(-1), Some(2));
        assert_eq!(history.resolve_index(-2), Some(1));
        assert_eq!(history.resolve_index(1), Some(1));
        assert_eq!(history.resolve_index(5), None);
        assert_eq!(history.resolve_index(-9), None);
    }
}
