//! String conversions shared by the standard parameter descriptors.

use std::collections::BTreeMap;

/// Splits on unquoted whitespace. Double quotes group words and a backslash
/// escapes the next character.
pub fn split_with_escapes(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
        } else if !quoted && c.is_whitespace() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Parses `key=value` / `key: value` lines. `#` and `!` start comments and a
/// trailing backslash continues the value on the next line.
pub fn parse_properties(s: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let mut pending = String::new();

    for line in s.lines() {
        let line = line.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);

        let split = logical.find(['=', ':']);
        let (key, value) = match split {
            Some(idx) => (&logical[..idx], &logical[idx + 1..]),
            None => match logical.split_once(char::is_whitespace) {
                Some((k, v)) => (k, v),
                None => (logical.as_str(), ""),
            },
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    map
}

/// `true` only for a case-insensitive "true".
pub fn parse_bool(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

/// Hint flags treat a bare flag ("" or "null") as set.
pub fn parse_hint(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "null" || parse_bool(s)
}

/// Splits on commas and whitespace, dropping empty items.
pub fn split_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
