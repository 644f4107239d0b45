//! Cursor and identifier analysis for completion and inspection.
//!
//! This is the naive resolver behind `complete_request` and
//! `inspect_request`: pull the identifier under the cursor out of the raw
//! code text, resolve it through the session scopes, and list attribute or
//! dict-key candidates.

use crate::errors::PyError;
use crate::interpreter::Scope;
use crate::interpreter::builtins::{attribute_names, get_attribute};
use crate::interpreter::value::Value;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Move the cursor left of a calling `(` or subscript `[` bracket when one
/// sits immediately to the left (ignoring a short run of quotes), so the
/// identifier examined is the called/subscripted object.
fn prefer_context(code: &[char], cursor: usize, bracket: char) -> Option<usize> {
    let start = cursor.min(code.len().saturating_sub(1));
    let window = 30usize;
    let mut offset = 0usize;
    let mut position = start as i64;
    while position >= 0 && offset < window {
        let c = code[position as usize];
        if c == bracket {
            // a few quotes directly inside the bracket are fine; any other
            // quote between cursor and bracket disqualifies the context
            let inner: Vec<char> = code[(position as usize + 1)..=start].to_vec();
            let quotes_leading = inner.iter().take_while(|c| **c == '\'' || **c == '"').count();
            let rest_clean = inner[quotes_leading..]
                .iter()
                .all(|c| *c != '\'' && *c != '"');
            if quotes_leading <= 3 && rest_clean && position > 0 {
                return Some((position - 1) as usize);
            }
            return None;
        }
        if c == '\'' || c == '"' {
            // handled via the inner scan above when the bracket is found
        }
        position -= 1;
        offset += 1;
    }
    None
}

/// Return the `[A-Za-z0-9_.]+` token the cursor lays upon.
pub fn get_identifier_at_cursor(
    code_text: &str,
    cursor_pos: usize,
    prefer_calling_context: bool,
    prefer_key_context: bool,
) -> String {
    let code: Vec<char> = code_text.chars().collect();
    if code.is_empty() {
        return String::new();
    }
    let mut cursor = cursor_pos;
    if prefer_calling_context {
        if let Some(moved) = prefer_context(&code, cursor, '(') {
            cursor = moved;
        }
    } else if prefer_key_context
        && let Some(moved) = prefer_context(&code, cursor, '[')
    {
        cursor = moved;
    }

    let start = cursor.min(code.len() - 1);
    // read left (dots included)...
    let mut left = String::new();
    let mut position = start as i64;
    while position >= 0 {
        let c = code[position as usize];
        if is_ident_char(c) || c == '.' {
            left.insert(0, c);
            position -= 1;
        } else {
            break;
        }
    }
    if !is_ident_char(code[start]) && code[start] != '.' {
        left.clear();
    }
    // ...and append the remainder to the right (no dots)
    let mut right = String::new();
    let mut position = cursor + 1;
    while position < code.len() && is_ident_char(code[position]) {
        right.push(code[position]);
        position += 1;
    }
    left + &right
}

/// Attribute listing ordered the completer's way: public names first, then
/// dunders, then single-underscore privates (privates excluded by default).
pub fn gather_reordered_attributes(
    value: &Value,
    include_private: bool,
    include_dunders: bool,
) -> Vec<String> {
    let mut public = Vec::new();
    let mut dunders = Vec::new();
    let mut privates = Vec::new();
    for name in attribute_names(value) {
        if name.starts_with("__") {
            dunders.push(name);
        } else if name.starts_with('_') {
            privates.push(name);
        } else {
            public.push(name);
        }
    }
    let mut ordered = public;
    if include_dunders {
        ordered.extend(dunders);
    }
    if include_private {
        ordered.extend(privates);
    }
    ordered
}

/// Resolve a possibly dotted identifier through locals, then globals.
///
/// With `allow_incomplete`, an unresolvable final segment is returned as a
/// remainder instead of an error so the completer can prefix-match it.
pub fn get_object_from_identifier(
    identifier: &str,
    scope: &Scope,
    allow_incomplete: bool,
) -> Result<(Value, String), PyError> {
    let (root, chain) = match identifier.split_once('.') {
        Some((root, chain)) => (root, chain),
        None => (identifier, ""),
    };

    let root_value = scope
        .locals
        .borrow()
        .get(root)
        .cloned()
        .or_else(|| scope.globals.borrow().get(root).cloned())
        .ok_or_else(|| PyError::name_error(root))?;

    if chain.is_empty() {
        return Ok((root_value, String::new()));
    }

    let parts: Vec<&str> = chain.split('.').collect();
    let mut current = root_value;
    for part in &parts[..parts.len() - 1] {
        current = get_attribute(&current, part)?;
    }
    let last = parts[parts.len() - 1];
    match get_attribute(&current, last) {
        Ok(resolved) => Ok((resolved, String::new())),
        Err(err) => {
            if allow_incomplete {
                Ok((current, last.to_string()))
            } else {
                Err(err)
            }
        }
    }
}

/// Candidate references that might fill out the identifier.
///
/// A name that does not resolve falls back to prefix matching over the
/// session scopes; a resolved prefix completes through its attributes; a
/// resolved dict in key context completes its keys.
pub fn match_references(
    identifier: &str,
    scope: &Scope,
    return_keys_if_dict: bool,
) -> Vec<String> {
    let resolved = get_object_from_identifier(identifier, scope, true);
    let (object, remainder) = match resolved {
        Ok(pair) => pair,
        Err(_) => {
            // closest simple matches from both scopes, locals first
            let mut names: Vec<String> = scope
                .locals
                .borrow()
                .keys()
                .chain(scope.globals.borrow().keys())
                .filter(|name| name.starts_with(identifier))
                .cloned()
                .collect();
            names.sort();
            names.dedup();
            return names;
        }
    };

    if !remainder.is_empty() {
        let matched = &identifier[..identifier.len() - remainder.len() - 1];
        let mut matches = Vec::new();
        for attribute in gather_reordered_attributes(&object, false, true) {
            if attribute == remainder {
                // exact match: offer the attributes of that attribute
                if let Ok(inner) = get_attribute(&object, &attribute) {
                    for sub in gather_reordered_attributes(&inner, false, true) {
                        matches.push(format!("{matched}.{attribute}.{sub}"));
                    }
                }
            } else if attribute.starts_with(&remainder) {
                matches.push(format!("{matched}.{attribute}"));
            }
        }
        return matches;
    }

    if return_keys_if_dict
        && let Value::Dict(entries) = &object
    {
        return entries.borrow().keys().map(|k| k.to_value().display()).collect();
    }

    let matched = identifier.trim_end_matches('.');
    gather_reordered_attributes(&object, false, true)
        .into_iter()
        .map(|attribute| format!("{matched}.{attribute}"))
        .collect()
}

/// Resolve the object under the cursor, if any.
pub fn get_object_from_cursor(
    code_text: &str,
    cursor_pos: usize,
    scope: &Scope,
    prefer_calling_context: bool,
) -> Result<Value, PyError> {
    let identifier =
        get_identifier_at_cursor(code_text, cursor_pos, prefer_calling_context, false);
    if identifier.is_empty() {
        return Err(PyError::name_error(""));
    }
    let (object, _) = get_object_from_identifier(&identifier, scope, false)?;
    Ok(object)
}

/// Plain-text directory listing used by `inspect_request`.
pub fn describe_object(value: &Value) -> String {
    let mut text = String::new();
    let type_line = match value {
        Value::Instance(i) => format!("<type '{}'>", i.class.name),
        other => format!("<type '{}'>", other.type_name()),
    };
    text.push_str(&type_line);
    text.push('\n');
    text.push_str(&value.repr());
    text.push('\n');
    let attributes = gather_reordered_attributes(value, true, true);
    if !attributes.is_empty() {
        text.push_str("Attributes:\n");
        for attribute in attributes {
            let detail = match get_attribute(value, &attribute) {
                Ok(resolved) => format!("  {attribute:<24} {}", resolved.type_name()),
                Err(_) => format!("  {attribute}"),
            };
            text.push_str(&detail);
            text.push('\n');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Namespace;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scope_with(locals: &[(&str, Value)], globals: &[(&str, Value)]) -> Scope {
        let mut local_map = Namespace::new();
        for (name, value) in locals {
            local_map.insert(name.to_string(), value.clone());
        }
        let mut global_map = Namespace::new();
        for (name, value) in globals {
            global_map.insert(name.to_string(), value.clone());
        }
        Scope::new(
            Rc::new(RefCell::new(global_map)),
            Rc::new(RefCell::new(local_map)),
        )
    }

    #[test]
    fn identifier_extraction_at_end_of_code() {
        let code = "ab = 1; ac = 2; a";
        assert_eq!(get_identifier_at_cursor(code, code.len(), false, false), "a");
        assert_eq!(get_identifier_at_cursor(code, 16, false, false), "a");
    }

    #[test]
    fn identifier_extraction_mid_token() {
        assert_eq!(get_identifier_at_cursor("foo.bar_baz", 6, false, false), "foo.bar_baz");
        assert_eq!(get_identifier_at_cursor("x + yy", 5, false, false), "yy");
    }

    #[test]
    fn calling_context_prefers_function_name() {
        // cursor inside the parens: identify the callee, not the argument
        let code = "thing(";
        assert_eq!(
            get_identifier_at_cursor(code, code.len(), true, false),
            "thing"
        );
    }

    #[test]
    fn key_context_prefers_subscripted_object() {
        let code = "mydict['";
        assert_eq!(
            get_identifier_at_cursor(code, code.len(), false, true),
            "mydict"
        );
    }

    #[test]
    fn unresolved_prefix_matches_scope_names() {
        let scope = scope_with(
            &[("ab", Value::Int(1))],
            &[("ac", Value::Int(2)), ("zz", Value::Int(3))],
        );
        let matches = match_references("a", &scope, true);
        assert_eq!(matches, vec!["ab".to_string(), "ac".to_string()]);
    }

    #[test]
    fn resolved_object_completes_attributes() {
        let scope = scope_with(&[("s", Value::str("hi"))], &[]);
        let matches = match_references("s.up", &scope, true);
        assert_eq!(matches, vec!["s.upper".to_string()]);
    }

    #[test]
    fn attribute_ordering_public_then_dunder() {
        let attrs = gather_reordered_attributes(&Value::str("x"), false, true);
        let first_dunder = attrs.iter().position(|a| a.starts_with("__")).unwrap();
        assert!(attrs[..first_dunder].iter().all(|a| !a.starts_with('_')));
        assert!(attrs[first_dunder..].iter().all(|a| a.starts_with("__")));
    }

    #[test]
    fn dict_in_key_context_returns_keys() {
        use crate::interpreter::value::DictKey;
        let mut entries = std::collections::BTreeMap::new();
        entries.insert(DictKey::Str("alpha".into()), Value::Int(1));
        entries.insert(DictKey::Str("beta".into()), Value::Int(2));
        let scope = scope_with(&[("d", Value::dict(entries))], &[]);
        let matches = match_references("d", &scope, true);
        assert_eq!(matches, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn dotted_resolution_walks_attributes() {
        let scope = scope_with(&[("n", Value::Int(5))], &[]);
        let (value, remainder) = get_object_from_identifier("n.real", &scope, true).unwrap();
        assert!(remainder.is_empty());
        assert!(value.py_eq(&Value::Int(5)));
    }

    #[test]
    fn describe_object_lists_type_and_attributes() {
        let text = describe_object(&Value::Int(3));
        assert!(text.starts_with("<type 'int'>"));
        assert!(text.contains("bit_length"));
    }

    #[test]
    fn cursor_resolution_for_inspection() {
        let scope = scope_with(&[("value", Value::Int(9))], &[]);
        let object = get_object_from_cursor("value(", 6, &scope, true).unwrap();
        assert!(object.py_eq(&Value::Int(9)));
        assert!(get_object_from_cursor("missing", 3, &scope, false).is_err());
    }
}
