//! Native `Headers` storage (spec §4.2).
//!
//! Each JS `Headers` instance is backed by one Rust `HeaderMap` parked in
//! `OpState`'s resource table; the JS wrapper only ever holds the numeric
//! `rid`. Case-insensitive names, insertion order, and `set-cookie`
//! fan-out all live here rather than in JS, matching the native-surface
//! decision for this object.

use std::cell::RefCell;
use std::borrow::Cow;

use deno_core::{op2, OpState, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Immutable,
    Request,
    Response,
    RequestNoCors,
}

#[derive(Debug, thiserror::Error, deno_error::JsError)]
pub enum HeaderError {
    #[class(type_error)]
    #[error("'{0}' is not a valid header name")]
    InvalidName(String),
    #[class(type_error)]
    #[error("value for '{0}' is not valid")]
    InvalidValue(String),
    #[class(type_error)]
    #[error("Headers are immutable")]
    Immutable,
    #[class(type_error)]
    #[error("'{0}' is a forbidden header in this context")]
    Forbidden(String),
    #[class(generic)]
    #[error("invalid header resource")]
    BadResource,
}

type Result<T> = std::result::Result<T, HeaderError>;

/// 128-entry ASCII token table (RFC 7230 `tchar`), indexed by byte value.
/// `true` for every byte legal in a header field-name.
const TOKEN_TABLE: [bool; 128] = build_token_table();

const fn build_token_table() -> [bool; 128] {
    let mut table = [false; 128];
    let mut i = 0;
    while i < 128 {
        let c = i as u8;
        let ok = c.is_ascii_alphanumeric()
            || matches!(
                c,
                b'!' | b'#'
                    | b'$'
                    | b'%'
                    | b'&'
                    | b'\''
                    | b'*'
                    | b'+'
                    | b'-'
                    | b'.'
                    | b'^'
                    | b'_'
                    | b'`'
                    | b'|'
                    | b'~'
            );
        table[i] = ok;
        i += 1;
    }
    table
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| (b as usize) < 128 && TOKEN_TABLE[b as usize])
}

fn is_valid_value(value: &str) -> bool {
    value.bytes().all(|b| b != 0 && b != b'\r' && b != b'\n')
}

fn trim_value(value: &str) -> &str {
    value.trim_matches(|c: char| matches!(c, '\t' | ' ' | '\r' | '\n'))
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Splits a `Set-Cookie` value on commas that are not inside a cookie
/// attribute's `=value` (a bare `,` inside an `Expires=` date is the classic
/// case this must not split on; cookie-aware parsing instead splits only
/// before a token that looks like the start of a new cookie-pair, i.e. a
/// comma followed by optional space and a token then `=`).
fn split_set_cookie(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b',' {
            // Look ahead past optional whitespace for `token '='`.
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            let name_start = j;
            while j < bytes.len() && bytes[j] != b'=' && bytes[j] != b',' && bytes[j] != b';' {
                j += 1;
            }
            if j > name_start && j < bytes.len() && bytes[j] == b'=' {
                parts.push(value[start..i].trim().to_string());
                start = i + 1;
            }
        }
        i += 1;
    }
    parts.push(value[start..].trim().to_string());
    parts
}

pub struct HeaderMap {
    guard: Guard,
    entries: RefCell<Vec<(String, String)>>,
}

impl HeaderMap {
    pub fn new(guard: Guard) -> Self {
        Self {
            guard,
            entries: RefCell::new(Vec::new()),
        }
    }

    fn check_mutable(&self) -> Result<()> {
        if self.guard == Guard::Immutable {
            Err(HeaderError::Immutable)
        } else {
            Ok(())
        }
    }

    pub fn append_raw(&self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        if !is_valid_name(name) {
            return Err(HeaderError::InvalidName(name.to_string()));
        }
        let value = trim_value(value);
        if !is_valid_value(value) {
            return Err(HeaderError::InvalidValue(name.to_string()));
        }
        let name = normalize_name(name);
        let mut entries = self.entries.borrow_mut();
        if name == "set-cookie" {
            for part in split_set_cookie(value) {
                entries.push((name.clone(), part));
            }
        } else {
            entries.push((name, value.to_string()));
        }
        Ok(())
    }

    pub fn set_raw(&self, name: &str, value: &str) -> Result<()> {
        self.check_mutable()?;
        if !is_valid_name(name) {
            return Err(HeaderError::InvalidName(name.to_string()));
        }
        let value = trim_value(value);
        if !is_valid_value(value) {
            return Err(HeaderError::InvalidValue(name.to_string()));
        }
        let name = normalize_name(name);
        let mut entries = self.entries.borrow_mut();
        entries.retain(|(n, _)| n != &name);
        if name == "set-cookie" {
            for part in split_set_cookie(value) {
                entries.push((name.clone(), part));
            }
        } else {
            entries.push((name, value.to_string()));
        }
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.check_mutable()?;
        let name = normalize_name(name);
        self.entries.borrow_mut().retain(|(n, _)| n != &name);
        Ok(())
    }

    /// `get`: values for `name` joined with `, `, or `None` if absent.
    /// `set-cookie` is special-cased by `get_set_cookie` instead; WHATWG
    /// `get()` on `set-cookie` returns only the first value un-joined.
    pub fn get(&self, name: &str) -> Option<String> {
        let name = normalize_name(name);
        let entries = self.entries.borrow();
        if name == "set-cookie" {
            return entries
                .iter()
                .find(|(n, _)| n == &name)
                .map(|(_, v)| v.clone());
        }
        let values: Vec<&str> = entries
            .iter()
            .filter(|(n, _)| n == &name)
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn get_set_cookie(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(n, _)| n == "set-cookie")
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.entries.borrow().iter().any(|(n, _)| n == &name)
    }

    /// Iteration order per spec §4.2: insertion order, one entry per
    /// distinct name with values comma-joined, except `set-cookie` which
    /// always yields one entry per value.
    pub fn entries(&self) -> Vec<(String, String)> {
        let entries = self.entries.borrow();
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for (name, _) in entries.iter() {
            if name == "set-cookie" || seen.contains(name) {
                continue;
            }
            seen.push(name.clone());
            out.push((name.clone(), self.get(name).unwrap()));
        }
        for (name, value) in entries.iter() {
            if name == "set-cookie" {
                out.push((name.clone(), value.clone()));
            }
        }
        out
    }
}

impl deno_core::Resource for HeaderMap {
    fn name(&self) -> Cow<str> {
        "Headers".into()
    }
}

#[op2(fast)]
#[smi]
pub fn op_headers_new(op_state: &mut OpState, #[smi] guard: i32) -> ResourceId {
    let guard = match guard {
        0 => Guard::Immutable,
        1 => Guard::Request,
        2 => Guard::Response,
        _ => Guard::RequestNoCors,
    };
    op_state.resource_table.add(HeaderMap::new(guard))
}

#[op2]
pub fn op_headers_append(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[string] name: &str,
    #[string] value: &str,
) -> Result<()> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    headers.append_raw(name, value)
}

#[op2]
pub fn op_headers_set(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[string] name: &str,
    #[string] value: &str,
) -> Result<()> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    headers.set_raw(name, value)
}

#[op2]
pub fn op_headers_delete(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[string] name: &str,
) -> Result<()> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    headers.delete(name)
}

#[op2]
#[string]
pub fn op_headers_get(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[string] name: &str,
) -> Result<Option<String>> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    Ok(headers.get(name))
}

#[op2(fast)]
pub fn op_headers_has(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
    #[string] name: &str,
) -> Result<bool> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    Ok(headers.has(name))
}

#[op2]
#[serde]
pub fn op_headers_get_set_cookie(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Result<Vec<String>> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    Ok(headers.get_set_cookie())
}

#[op2]
#[serde]
pub fn op_headers_entries(
    op_state: &mut OpState,
    #[smi] rid: ResourceId,
) -> Result<Vec<(String, String)>> {
    let headers = op_state
        .resource_table
        .get::<HeaderMap>(rid)
        .map_err(|_| HeaderError::BadResource)?;
    Ok(headers.entries())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_joins_with_comma_space() {
        let h = HeaderMap::new(Guard::Response);
        h.append_raw("X-Foo", "a").unwrap();
        h.append_raw("x-foo", "b").unwrap();
        assert_eq!(h.get("X-FOO"), Some("a, b".to_string()));
    }

    #[test]
    fn set_cookie_not_joined_on_get_but_split_on_append() {
        let h = HeaderMap::new(Guard::Response);
        h.append_raw("Set-Cookie", "a=1, b=2").unwrap();
        assert_eq!(h.get_set_cookie(), vec!["a=1".to_string(), "b=2".to_string()]);
    }

    #[test]
    fn set_cookie_date_comma_not_split() {
        let h = HeaderMap::new(Guard::Response);
        h.append_raw(
            "Set-Cookie",
            "id=1; Expires=Wed, 21 Oct 2025 07:28:00 GMT",
        )
        .unwrap();
        assert_eq!(h.get_set_cookie().len(), 1);
    }

    #[test]
    fn immutable_guard_rejects_mutation() {
        let h = HeaderMap::new(Guard::Immutable);
        assert!(matches!(h.append_raw("a", "b"), Err(HeaderError::Immutable)));
    }

    #[test]
    fn empty_name_rejected() {
        let h = HeaderMap::new(Guard::Response);
        assert!(matches!(
            h.append_raw("", "b"),
            Err(HeaderError::InvalidName(_))
        ));
    }

    #[test]
    fn value_with_interior_crlf_rejected() {
        let h = HeaderMap::new(Guard::Response);
        assert!(matches!(
            h.append_raw("a", "b\r\nc"),
            Err(HeaderError::InvalidValue(_))
        ));
    }

    #[test]
    fn entries_preserve_insertion_order() {
        let h = HeaderMap::new(Guard::Response);
        h.append_raw("b", "2").unwrap();
        h.append_raw("a", "1").unwrap();
        assert_eq!(
            h.entries(),
            vec![("b".into(), "2".into()), ("a".into(), "1".into())]
        );
    }
}
