/// Attributes parsed from one tag occurrence, in source order.
///
/// The first occurrence of a name wins; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(String, String)>,
}

impl AttributeMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|(k, _)| keep(k));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert_first(&mut self, name: &str, value: String) {
        if self.get(name).is_none() {
            self.entries.push((name.to_string(), value));
        }
    }
}

/// Parse the attribute list of a tag (everything between the tag name and `>`).
///
/// Only `name=value` pairs are recognised, where value is `{...}`, `"..."` or
/// `'...'`. Braces do not nest: a `{` value ends at the first `}`. Spread
/// props and bare boolean attributes are skipped.
pub fn parse_attributes(input: &str) -> AttributeMap {
    let bytes = input.as_bytes();
    let mut map = AttributeMap::default();
    let mut pos = 0;

    while pos < bytes.len() {
        match scan_pair(bytes, pos) {
            Some((name_end, value_start, value_end)) => {
                let name = &input[pos..name_end];
                let value = unwrap_value(&input[value_start..value_end]);
                map.insert_first(name, value);
                pos = value_end;
            }
            None => pos += 1,
        }
    }

    map
}

/// Try to match `name \s* = \s* value` starting exactly at `start`.
/// Returns (end of name, start of value, end of value).
fn scan_pair(bytes: &[u8], start: usize) -> Option<(usize, usize, usize)> {
    if !is_name_start(bytes[start]) {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    let name_end = i;

    i = skip_ws(bytes, i);
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i = skip_ws(bytes, i + 1);

    let close = match bytes.get(i)? {
        b'{' => b'}',
        b'"' => b'"',
        b'\'' => b'\'',
        _ => return None,
    };
    let value_start = i;
    let rel = bytes[i + 1..].iter().position(|&b| b == close)?;
    Some((name_end, value_start, i + 1 + rel + 1))
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-')
}

/// Strip one layer of delimiters. Expressions are kept as source text.
pub fn unwrap_value(raw: &str) -> String {
    let raw = raw.trim();
    for (open, close) in [('{', '}'), ('(', ')')] {
        if let Some(inner) = raw.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            return inner.trim().to_string();
        }
    }
    for quote in ['"', '\''] {
        if raw.len() >= 2 {
            if let Some(inner) = raw.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
                return inner.to_string();
            }
        }
    }
    raw.to_string()
}

// ── Tests ──
