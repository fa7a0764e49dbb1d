//! JSONP envelope stripping.
//!
//! A response is expected to look like `prefix callback({...});` where the
//! prefix holds no `{`. The object literal is located with a bracket-depth
//! scan that understands JSON string literals, so braces inside quoted values
//! never end the payload early.

use crate::utils::error::{EtlError, Result};

/// The pieces of a JSONP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unwrapped<'a> {
    pub callback: &'a str,
    pub payload: &'a str,
}

/// Strips the callback wrapper from `raw`, returning the object literal verbatim.
///
/// The payload is not checked for JSON validity. A payload that runs to end
/// of input without closing is still returned so the caller's JSON parse can
/// report it.
pub fn unwrap(raw: &str) -> Result<Unwrapped<'_>> {
    let open = raw.find('{').ok_or_else(|| EtlError::format_error(raw))?;
    let callback = callback_name(&raw[..open]).ok_or_else(|| EtlError::format_error(raw))?;

    let payload = match matching_brace(raw, open) {
        Some(close) => {
            if !is_call_suffix(&raw[close + 1..]) {
                return Err(EtlError::format_error(raw));
            }
            &raw[open..=close]
        }
        None => truncated_payload(&raw[open..]),
    };

    Ok(Unwrapped { callback, payload })
}

/// Returns the identifier directly before the opening parenthesis of `prefix`.
fn callback_name(prefix: &str) -> Option<&str> {
    let before_paren = prefix.trim_end().strip_suffix('(')?.trim_end();
    let start = before_paren
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(&before_paren[start..])
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Byte offset of the `}` closing the object that opens at `open`.
fn matching_brace(raw: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in raw.as_bytes()[open..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }

    None
}

/// Accepts `)` followed by optional whitespace, one optional `;` and more whitespace.
fn is_call_suffix(rest: &str) -> bool {
    match rest.trim_start().strip_prefix(')') {
        Some(after) => {
            let after = after.trim();
            after.is_empty() || after == ";"
        }
        None => false,
    }
}

fn truncated_payload(rest: &str) -> &str {
    let rest = rest.trim_end();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    rest.strip_suffix(')').unwrap_or(rest)
}
