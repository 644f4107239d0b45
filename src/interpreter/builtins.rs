//! Builtin scope, builtin-type methods, attribute access, and the small
//! module registry backing `import`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::errors::PyError;
use crate::interpreter::value::{
    BoundMethodObj, BuiltinDef, DictKey, MethodBinding, ModuleObj, Namespace, Value, format_float,
};

// --- builtin scope ---

macro_rules! builtin {
    ($name:ident) => {
        BuiltinDef {
            name: stringify!($name),
            func: $name,
        }
    };
}

static BUILTINS: &[BuiltinDef] = &[
    builtin!(abs),
    builtin!(bool),
    builtin!(dict),
    builtin!(dir),
    builtin!(float),
    builtin!(int),
    builtin!(len),
    builtin!(list),
    builtin!(max),
    builtin!(min),
    builtin!(range),
    builtin!(repr),
    builtin!(sorted),
    builtin!(str),
    builtin!(sum),
    BuiltinDef {
        name: "type",
        func: r#type,
    },
];

/// Resolve a name in the builtin scope.
pub fn lookup_builtin(name: &str) -> Option<Value> {
    BUILTINS
        .iter()
        .find(|b| b.name == name)
        .map(Value::Builtin)
}

pub fn builtin_names() -> Vec<String> {
    BUILTINS.iter().map(|b| b.name.to_string()).collect()
}

fn arity(args: &[Value], name: &str, min: usize, max: usize) -> Result<(), PyError> {
    if args.len() < min || args.len() > max {
        return Err(PyError::type_error(format!(
            "{name}() takes {min} to {max} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn abs(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "abs", 1, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => Err(PyError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

fn bool(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "bool", 0, 1)?;
    Ok(Value::Bool(args.first().map(Value::truthy).unwrap_or(false)))
}

fn dict(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "dict", 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Value::dict(BTreeMap::new())),
        Some(Value::Dict(entries)) => Ok(Value::dict(entries.borrow().clone())),
        Some(other) => Err(PyError::type_error(format!(
            "cannot convert '{}' object to dict",
            other.type_name()
        ))),
    }
}

fn dir(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "dir", 1, 1)?;
    let mut names = attribute_names(&args[0]);
    names.sort();
    Ok(Value::list(names.into_iter().map(Value::str).collect()))
}

fn float(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "float", 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Value::Float(0.0)),
        Some(value) => match &value {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| PyError::value_error(format!("invalid literal for float(): {s}"))),
            other => other
                .as_float()
                .map(Value::Float)
                .ok_or_else(|| {
                    PyError::type_error(format!(
                        "float() argument must be a string or a number, not '{}'",
                        other.type_name()
                    ))
                }),
        },
    }
}

fn int(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "int", 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Value::Int(0)),
        Some(value) => match &value {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| {
                    PyError::value_error(format!(
                        "invalid literal for int() with base 10: '{s}'"
                    ))
                }),
            other => Err(PyError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn len(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "len", 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => {
            return Err(PyError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(n as i64))
}

fn list(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "list", 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Value::list(Vec::new())),
        Some(value) => Ok(Value::list(iterate(&value)?)),
    }
}

fn min_max(args: Vec<Value>, name: &str, want: Ordering) -> Result<Value, PyError> {
    let items = if args.len() == 1 {
        iterate(&args[0])?
    } else {
        args
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| PyError::value_error(format!("{name}() arg is an empty sequence")))?;
    for item in iter {
        if py_compare(&item, &best)? == want {
            best = item;
        }
    }
    Ok(best)
}

fn max(args: Vec<Value>) -> Result<Value, PyError> {
    if args.is_empty() {
        return Err(PyError::type_error("max expected at least 1 argument, got 0"));
    }
    min_max(args, "max", Ordering::Greater)
}

fn min(args: Vec<Value>) -> Result<Value, PyError> {
    if args.is_empty() {
        return Err(PyError::type_error("min expected at least 1 argument, got 0"));
    }
    min_max(args, "min", Ordering::Less)
}

fn range(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "range", 1, 3)?;
    let nums: Vec<i64> = args
        .iter()
        .map(|a| {
            a.as_int().ok_or_else(|| {
                PyError::type_error(format!(
                    "range() integer argument expected, got {}",
                    a.type_name()
                ))
            })
        })
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match nums.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!(),
    };
    if step == 0 {
        return Err(PyError::value_error("range() step argument must not be zero"));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current += step;
    }
    Ok(Value::list(items))
}

fn repr(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "repr", 1, 1)?;
    Ok(Value::str(args[0].repr()))
}

fn sorted(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "sorted", 1, 1)?;
    let mut items = iterate(&args[0])?;
    let mut failure = None;
    items.sort_by(|a, b| match py_compare(a, b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::list(items)),
    }
}

fn str(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "str", 0, 1)?;
    Ok(Value::str(
        args.first().map(Value::display).unwrap_or_default(),
    ))
}

fn sum(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "sum", 1, 2)?;
    let items = iterate(&args[0])?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in items {
        total = numeric_add(&total, &item)?;
    }
    Ok(total)
}

fn r#type(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "type", 1, 1)?;
    let name = match &args[0] {
        Value::Instance(i) => i.class.name.clone(),
        other => other.type_name().to_string(),
    };
    Ok(Value::str(format!("<type '{name}'>")))
}

fn numeric_add(a: &Value, b: &Value) -> Result<Value, PyError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_add(*y))),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(PyError::type_error(format!(
                "unsupported operand type(s) for +: '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

// --- iteration and ordering ---

/// Materialize an iterable the way `for`, `list()` and friends consume it.
pub fn iterate(value: &Value) -> Result<Vec<Value>, PyError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.borrow().keys().map(DictKey::to_value).collect()),
        other => Err(PyError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Ordering for `<`/`>`/`sorted`; mixed non-numeric types raise TypeError.
pub fn py_compare(a: &Value, b: &Value) -> Result<Ordering, PyError> {
    if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
        return x
            .partial_cmp(&y)
            .ok_or_else(|| PyError::value_error("cannot compare NaN values"));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            for (left, right) in x.iter().zip(y.iter()) {
                match py_compare(left, right)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                match py_compare(left, right)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(PyError::type_error(format!(
            "cannot compare '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Membership test for `in` / `not in`.
pub fn contains(container: &Value, item: &Value) -> Result<bool, PyError> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(PyError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(entries) => {
            let key = DictKey::from_value(item)?;
            Ok(entries.borrow().contains_key(&key))
        }
        other => Err(PyError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// --- attribute access ---

const STR_METHODS: &[&str] = &[
    "capitalize",
    "count",
    "endswith",
    "find",
    "join",
    "lower",
    "replace",
    "split",
    "startswith",
    "strip",
    "upper",
];

const LIST_METHODS: &[&str] = &[
    "append", "count", "extend", "index", "insert", "pop", "remove", "reverse", "sort",
];

const DICT_METHODS: &[&str] = &[
    "clear",
    "get",
    "items",
    "keys",
    "pop",
    "setdefault",
    "update",
    "values",
];

const INT_ATTRS: &[&str] = &["bit_length", "conjugate", "denominator", "imag", "numerator", "real"];

const COMMON_DUNDERS: &[&str] = &["__class__", "__doc__", "__eq__", "__ne__", "__repr__", "__str__"];

/// Raw attribute listing for an object, in no particular order. Callers
/// apply the public/dunder/private ordering themselves.
pub fn attribute_names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = COMMON_DUNDERS.iter().map(|s| s.to_string()).collect();
    match value {
        Value::Str(_) => {
            names.extend(STR_METHODS.iter().map(|s| s.to_string()));
            names.push("__len__".to_string());
        }
        Value::List(_) => {
            names.extend(LIST_METHODS.iter().map(|s| s.to_string()));
            names.push("__len__".to_string());
        }
        Value::Tuple(_) => {
            names.extend(["count", "index"].iter().map(|s| s.to_string()));
            names.push("__len__".to_string());
        }
        Value::Dict(_) => {
            names.extend(DICT_METHODS.iter().map(|s| s.to_string()));
            names.push("__len__".to_string());
        }
        Value::Int(_) | Value::Bool(_) => {
            names.extend(INT_ATTRS.iter().map(|s| s.to_string()));
        }
        Value::Float(_) => {
            names.extend(["conjugate", "imag", "is_integer", "real"].iter().map(|s| s.to_string()));
        }
        Value::Function(_) | Value::Builtin(_) | Value::Method(_) | Value::BoundMethod(_) => {
            names.extend(["__call__", "__name__"].iter().map(|s| s.to_string()));
        }
        Value::Class(class) => {
            names.extend(class.attrs.borrow().keys().cloned());
            names.push("__name__".to_string());
        }
        Value::Instance(instance) => {
            names.extend(instance.attrs.borrow().keys().cloned());
            names.extend(instance.class.attrs.borrow().keys().cloned());
        }
        Value::Module(module) => {
            names.extend(module.attrs.keys().cloned());
            names.push("__name__".to_string());
        }
        Value::None | Value::History(..) => {}
    }
    names.sort();
    names.dedup();
    names
}

/// `getattr` across the value model.
pub fn get_attribute(value: &Value, attr: &str) -> Result<Value, PyError> {
    let method = |name: &'static str| {
        Value::Method(Rc::new(MethodBinding {
            recv: value.clone(),
            name,
        }))
    };
    match value {
        Value::Str(_) => {
            if let Some(name) = STR_METHODS.iter().find(|m| **m == attr) {
                return Ok(method(name));
            }
        }
        Value::List(_) => {
            if let Some(name) = LIST_METHODS.iter().find(|m| **m == attr) {
                return Ok(method(name));
            }
        }
        Value::Dict(_) => {
            if let Some(name) = DICT_METHODS.iter().find(|m| **m == attr) {
                return Ok(method(name));
            }
        }
        Value::Int(n) => match attr {
            "real" | "numerator" | "conjugate" => return Ok(Value::Int(*n)),
            "imag" => return Ok(Value::Int(0)),
            "denominator" => return Ok(Value::Int(1)),
            "bit_length" => return Ok(method("bit_length")),
            _ => {}
        },
        Value::Float(f) => match attr {
            "real" | "conjugate" => return Ok(Value::Float(*f)),
            "imag" => return Ok(Value::Float(0.0)),
            "is_integer" => return Ok(method("is_integer")),
            _ => {}
        },
        Value::Function(func) => match attr {
            "__name__" => return Ok(Value::str(func.name.clone())),
            "__doc__" => return Ok(Value::None),
            _ => {}
        },
        Value::Class(class) => {
            if attr == "__name__" {
                return Ok(Value::str(class.name.clone()));
            }
            if let Some(found) = class.attrs.borrow().get(attr) {
                return Ok(found.clone());
            }
        }
        Value::Instance(instance) => {
            if let Some(found) = instance.attrs.borrow().get(attr) {
                return Ok(found.clone());
            }
            if let Some(found) = instance.class.attrs.borrow().get(attr) {
                // functions found through the class bind the receiver
                if let Value::Function(func) = found {
                    return Ok(Value::BoundMethod(Rc::new(BoundMethodObj {
                        func: func.clone(),
                        recv: value.clone(),
                    })));
                }
                return Ok(found.clone());
            }
        }
        Value::Module(module) => {
            if attr == "__name__" {
                return Ok(Value::str(module.name.clone()));
            }
            if let Some(found) = module.attrs.get(attr) {
                return Ok(found.clone());
            }
        }
        _ => {}
    }
    Err(PyError::attribute_error(
        &instance_type_name(value),
        attr,
    ))
}

fn instance_type_name(value: &Value) -> String {
    match value {
        Value::Instance(i) => i.class.name.clone(),
        other => other.type_name().to_string(),
    }
}

/// `setattr`; only class instances (and classes) are writable.
pub fn set_attribute(value: &Value, attr: &str, new_value: Value) -> Result<(), PyError> {
    match value {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(attr.to_string(), new_value);
            Ok(())
        }
        Value::Class(class) => {
            class.attrs.borrow_mut().insert(attr.to_string(), new_value);
            Ok(())
        }
        other => Err(PyError::attribute_error(other.type_name(), attr)),
    }
}

// --- builtin-type method dispatch ---

pub fn call_method(recv: &Value, name: &str, args: Vec<Value>) -> Result<Value, PyError> {
    match recv {
        Value::Str(s) => str_method(s, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Dict(entries) => dict_method(entries, name, args),
        Value::Int(n) => match name {
            "bit_length" => Ok(Value::Int(64 - n.unsigned_abs().leading_zeros() as i64)),
            _ => Err(PyError::attribute_error("int", name)),
        },
        Value::Float(f) => match name {
            "is_integer" => Ok(Value::Bool(f.fract() == 0.0 && f.is_finite())),
            _ => Err(PyError::attribute_error("float", name)),
        },
        Value::Tuple(items) => match name {
            "count" => {
                arity(&args, "count", 1, 1)?;
                let n = items.iter().filter(|v| v.py_eq(&args[0])).count();
                Ok(Value::Int(n as i64))
            }
            "index" => {
                arity(&args, "index", 1, 1)?;
                items
                    .iter()
                    .position(|v| v.py_eq(&args[0]))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| PyError::value_error("tuple.index(x): x not in tuple"))
            }
            _ => Err(PyError::attribute_error("tuple", name)),
        },
        other => Err(PyError::attribute_error(other.type_name(), name)),
    }
}

fn expect_str(value: &Value, method: &str) -> Result<String, PyError> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            PyError::type_error(format!(
                "{method}() argument must be a string, not '{}'",
                value.type_name()
            ))
        })
}

fn str_method(s: &Rc<String>, name: &str, args: Vec<Value>) -> Result<Value, PyError> {
    match name {
        "upper" => Ok(Value::str(s.to_uppercase())),
        "lower" => Ok(Value::str(s.to_lowercase())),
        "capitalize" => {
            let mut chars = s.chars();
            let capitalized = match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            };
            Ok(Value::str(capitalized))
        }
        "strip" => {
            arity(&args, "strip", 0, 1)?;
            match args.first() {
                None => Ok(Value::str(s.trim())),
                Some(chars) => {
                    let set: Vec<char> = expect_str(chars, "strip")?.chars().collect();
                    Ok(Value::str(s.trim_matches(|c| set.contains(&c))))
                }
            }
        }
        "split" => {
            arity(&args, "split", 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(sep, "split")?;
                    if sep.is_empty() {
                        return Err(PyError::value_error("empty separator"));
                    }
                    s.split(sep.as_str()).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity(&args, "join", 1, 1)?;
            let items = iterate(&args[0])?;
            let parts: Vec<String> = items
                .iter()
                .map(|item| {
                    item.as_str().map(|v| v.to_string()).ok_or_else(|| {
                        PyError::type_error(format!(
                            "sequence item: expected string, {} found",
                            item.type_name()
                        ))
                    })
                })
                .collect::<Result<_, _>>()?;
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            arity(&args, "replace", 2, 2)?;
            let from = expect_str(&args[0], "replace")?;
            let to = expect_str(&args[1], "replace")?;
            Ok(Value::str(s.replace(&from, &to)))
        }
        "startswith" => {
            arity(&args, "startswith", 1, 1)?;
            Ok(Value::Bool(s.starts_with(&expect_str(&args[0], "startswith")?)))
        }
        "endswith" => {
            arity(&args, "endswith", 1, 1)?;
            Ok(Value::Bool(s.ends_with(&expect_str(&args[0], "endswith")?)))
        }
        "find" => {
            arity(&args, "find", 1, 1)?;
            let needle = expect_str(&args[0], "find")?;
            Ok(Value::Int(match s.find(&needle) {
                Some(byte_pos) => s[..byte_pos].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            arity(&args, "count", 1, 1)?;
            let needle = expect_str(&args[0], "count")?;
            if needle.is_empty() {
                return Ok(Value::Int(s.chars().count() as i64 + 1));
            }
            Ok(Value::Int(s.matches(&needle).count() as i64))
        }
        _ => Err(PyError::attribute_error("str", name)),
    }
}

fn list_method(
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, PyError> {
    match name {
        "append" => {
            arity(&args, "append", 1, 1)?;
            items.borrow_mut().push(args.into_iter().next().unwrap_or(Value::None));
            Ok(Value::None)
        }
        "extend" => {
            arity(&args, "extend", 1, 1)?;
            let extra = iterate(&args[0])?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            arity(&args, "insert", 2, 2)?;
            let index = args[0]
                .as_int()
                .ok_or_else(|| PyError::type_error("insert() index must be an integer"))?;
            let mut list = items.borrow_mut();
            let index = (index.max(0) as usize).min(list.len());
            list.insert(index, args[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            arity(&args, "pop", 0, 1)?;
            let mut list = items.borrow_mut();
            if list.is_empty() {
                return Err(PyError::index_error("pop from empty list"));
            }
            let index = match args.first() {
                None => list.len() - 1,
                Some(arg) => {
                    let raw = arg
                        .as_int()
                        .ok_or_else(|| PyError::type_error("pop() index must be an integer"))?;
                    let resolved = if raw < 0 { raw + list.len() as i64 } else { raw };
                    if resolved < 0 || resolved as usize >= list.len() {
                        return Err(PyError::index_error("pop index out of range"));
                    }
                    resolved as usize
                }
            };
            Ok(list.remove(index))
        }
        "remove" => {
            arity(&args, "remove", 1, 1)?;
            let mut list = items.borrow_mut();
            match list.iter().position(|v| v.py_eq(&args[0])) {
                Some(index) => {
                    list.remove(index);
                    Ok(Value::None)
                }
                None => Err(PyError::value_error("list.remove(x): x not in list")),
            }
        }
        "index" => {
            arity(&args, "index", 1, 1)?;
            items
                .borrow()
                .iter()
                .position(|v| v.py_eq(&args[0]))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| PyError::value_error("list.index(x): x not in list"))
        }
        "count" => {
            arity(&args, "count", 1, 1)?;
            let n = items.borrow().iter().filter(|v| v.py_eq(&args[0])).count();
            Ok(Value::Int(n as i64))
        }
        "reverse" => {
            arity(&args, "reverse", 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        "sort" => {
            arity(&args, "sort", 0, 0)?;
            let mut list = items.borrow_mut();
            let mut failure = None;
            list.sort_by(|a, b| match py_compare(a, b) {
                Ok(ordering) => ordering,
                Err(err) => {
                    failure.get_or_insert(err);
                    Ordering::Equal
                }
            });
            match failure {
                Some(err) => Err(err),
                None => Ok(Value::None),
            }
        }
        _ => Err(PyError::attribute_error("list", name)),
    }
}

fn dict_method(
    entries: &Rc<RefCell<BTreeMap<DictKey, Value>>>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, PyError> {
    match name {
        "get" => {
            arity(&args, "get", 1, 2)?;
            let key = DictKey::from_value(&args[0])?;
            Ok(entries
                .borrow()
                .get(&key)
                .cloned()
                .or_else(|| args.get(1).cloned())
                .unwrap_or(Value::None))
        }
        "keys" => {
            arity(&args, "keys", 0, 0)?;
            Ok(Value::list(
                entries.borrow().keys().map(DictKey::to_value).collect(),
            ))
        }
        "values" => {
            arity(&args, "values", 0, 0)?;
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }
        "items" => {
            arity(&args, "items", 0, 0)?;
            Ok(Value::list(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::Tuple(Rc::new(vec![k.to_value(), v.clone()])))
                    .collect(),
            ))
        }
        "pop" => {
            arity(&args, "pop", 1, 2)?;
            let key = DictKey::from_value(&args[0])?;
            match entries.borrow_mut().remove(&key) {
                Some(value) => Ok(value),
                None => args
                    .get(1)
                    .cloned()
                    .ok_or_else(|| PyError::key_error(&key.repr())),
            }
        }
        "clear" => {
            arity(&args, "clear", 0, 0)?;
            entries.borrow_mut().clear();
            Ok(Value::None)
        }
        "update" => {
            arity(&args, "update", 1, 1)?;
            match &args[0] {
                Value::Dict(other) => {
                    let additions = other.borrow().clone();
                    entries.borrow_mut().extend(additions);
                    Ok(Value::None)
                }
                other => Err(PyError::type_error(format!(
                    "update() argument must be a dict, not '{}'",
                    other.type_name()
                ))),
            }
        }
        "setdefault" => {
            arity(&args, "setdefault", 1, 2)?;
            let key = DictKey::from_value(&args[0])?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            let mut map = entries.borrow_mut();
            Ok(map.entry(key).or_insert(default).clone())
        }
        _ => Err(PyError::attribute_error("dict", name)),
    }
}

// --- module registry ---

/// Resolve an importable module by name.
pub fn import_module(name: &str) -> Result<Value, PyError> {
    match name {
        "math" => Ok(Value::Module(Rc::new(ModuleObj {
            name: "math".to_string(),
            attrs: math_attrs(),
        }))),
        other => Err(PyError::import_error(other)),
    }
}

static MATH_FUNCS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "ceil",
        func: math_ceil,
    },
    BuiltinDef {
        name: "fabs",
        func: math_fabs,
    },
    BuiltinDef {
        name: "floor",
        func: math_floor,
    },
    BuiltinDef {
        name: "log",
        func: math_log,
    },
    BuiltinDef {
        name: "pow",
        func: math_pow,
    },
    BuiltinDef {
        name: "sqrt",
        func: math_sqrt,
    },
];

fn math_attrs() -> Namespace {
    let mut attrs = Namespace::new();
    attrs.insert("pi".to_string(), Value::Float(std::f64::consts::PI));
    attrs.insert("e".to_string(), Value::Float(std::f64::consts::E));
    for def in MATH_FUNCS {
        attrs.insert(def.name.to_string(), Value::Builtin(def));
    }
    attrs
}

fn math_arg(args: &[Value], name: &str) -> Result<f64, PyError> {
    arity(args, name, 1, 1)?;
    args[0].as_float().ok_or_else(|| {
        PyError::type_error(format!("a float is required, not '{}'", args[0].type_name()))
    })
}

fn math_sqrt(args: Vec<Value>) -> Result<Value, PyError> {
    let x = math_arg(&args, "sqrt")?;
    if x < 0.0 {
        return Err(PyError::value_error("math domain error"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn math_floor(args: Vec<Value>) -> Result<Value, PyError> {
    Ok(Value::Float(math_arg(&args, "floor")?.floor()))
}

fn math_ceil(args: Vec<Value>) -> Result<Value, PyError> {
    Ok(Value::Float(math_arg(&args, "ceil")?.ceil()))
}

fn math_fabs(args: Vec<Value>) -> Result<Value, PyError> {
    Ok(Value::Float(math_arg(&args, "fabs")?.abs()))
}

fn math_log(args: Vec<Value>) -> Result<Value, PyError> {
    let x = math_arg(&args, "log")?;
    if x <= 0.0 {
        return Err(PyError::value_error("math domain error"));
    }
    Ok(Value::Float(x.ln()))
}

fn math_pow(args: Vec<Value>) -> Result<Value, PyError> {
    arity(&args, "pow", 2, 2)?;
    let x = args[0]
        .as_float()
        .ok_or_else(|| PyError::type_error("a float is required"))?;
    let y = args[1]
        .as_float()
        .ok_or_else(|| PyError::type_error("a float is required"))?;
    Ok(Value::Float(x.powf(y)))
}

/// Exposed for `repr`-style float display in other modules.
pub fn float_repr(f: f64) -> String {
    format_float(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_and_call() {
        let len = lookup_builtin("len").unwrap();
        match len {
            Value::Builtin(def) => {
                let result = (def.func)(vec![Value::str("abcd")]).unwrap();
                assert!(result.py_eq(&Value::Int(4)));
            }
            other => panic!("expected builtin, got {other:?}"),
        }
        assert!(lookup_builtin("nope").is_none());
    }

    #[test]
    fn range_matches_python() {
        let r = range(vec![Value::Int(3)]).unwrap();
        assert_eq!(r.repr(), "[0, 1, 2]");
        let r = range(vec![Value::Int(5), Value::Int(1), Value::Int(-2)]).unwrap();
        assert_eq!(r.repr(), "[5, 3]");
        assert_eq!(
            range(vec![Value::Int(0), Value::Int(1), Value::Int(0)])
                .unwrap_err()
                .ename,
            "ValueError"
        );
    }

    #[test]
    fn str_methods() {
        let s = Value::str("a,b,c");
        let parts = call_method(&s, "split", vec![Value::str(",")]).unwrap();
        assert_eq!(parts.repr(), "['a', 'b', 'c']");
        let joined = call_method(&Value::str("-"), "join", vec![parts]).unwrap();
        assert_eq!(joined.display(), "a-b-c");
        assert_eq!(
            call_method(&Value::str("Hey"), "upper", vec![]).unwrap().display(),
            "HEY"
        );
    }

    #[test]
    fn list_methods_mutate_shared_backing() {
        let list = Value::list(vec![Value::Int(2), Value::Int(1)]);
        let alias = list.clone();
        call_method(&list, "append", vec![Value::Int(3)]).unwrap();
        call_method(&alias, "sort", vec![]).unwrap();
        assert_eq!(list.repr(), "[1, 2, 3]");
    }

    #[test]
    fn dict_methods() {
        let mut entries = BTreeMap::new();
        entries.insert(DictKey::Str("a".into()), Value::Int(1));
        let d = Value::dict(entries);
        assert!(call_method(&d, "get", vec![Value::str("a")])
            .unwrap()
            .py_eq(&Value::Int(1)));
        assert!(call_method(&d, "get", vec![Value::str("zz")])
            .unwrap()
            .is_none());
        let keys = call_method(&d, "keys", vec![]).unwrap();
        assert_eq!(keys.repr(), "['a']");
        assert_eq!(
            call_method(&d, "pop", vec![Value::str("zz")]).unwrap_err().ename,
            "KeyError"
        );
    }

    #[test]
    fn attribute_access_on_int() {
        assert!(get_attribute(&Value::Int(7), "real")
            .unwrap()
            .py_eq(&Value::Int(7)));
        assert_eq!(
            get_attribute(&Value::Int(7), "nope").unwrap_err().ename,
            "AttributeError"
        );
    }

    #[test]
    fn math_module_imports() {
        let math = import_module("math").unwrap();
        let pi = get_attribute(&math, "pi").unwrap();
        assert!(pi.as_float().unwrap() > 3.14);
        assert_eq!(import_module("junk").unwrap_err().ename, "ImportError");
    }

    #[test]
    fn compare_mixed_types_fails() {
        assert_eq!(
            py_compare(&Value::Int(1), &Value::str("a")).unwrap_err().ename,
            "TypeError"
        );
        assert_eq!(
            py_compare(&Value::Int(1), &Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
    }
}
