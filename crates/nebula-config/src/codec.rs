//! Text and binary encodings of a settings file.
//!
//! Both decoders return the raw `(name, value)` pairs in file order, including
//! the `config_version` entry; applying them to a store is the loader's job.
//!
//! ## Text format
//!
//! INI-like: `[section]` headers, `key=value` lines, `;` or `#` comments.
//! A key under a section is stored as `section/key`; keys before the first
//! section are stored as-is. Values are RON and may span several lines while
//! brackets are open. Keys with characters outside `[A-Za-z0-9_/.+-]` are
//! written as quoted strings.
//!
//! ## Binary Layout (NSET)
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"NSET"` |
//! | 4 | 4 | Entry count (`u32`, little-endian) |
//! | 8 | … | Per entry: `u32` name length, UTF-8 name, `u32` value length, encoded value |
//!
//! A value is a one-byte tag followed by its payload, all little-endian:
//!
//! | Tag | Type | Payload |
//! |-----|------|---------|
//! | 0 | Nil | none |
//! | 1 | Bool | `u8` |
//! | 2 | Int | `i64` |
//! | 3 | Float | `f64` |
//! | 4 | String | `u32` length, UTF-8 bytes |
//! | 5 | Array | `u32` count, values |
//! | 6 | Map | `u32` count, per pair `u32` key length, key, value |
//! | 7 | Bytes | `u32` length, bytes |

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::SettingsError;
use crate::value::Value;

/// Magic bytes identifying a binary settings file.
pub const BINARY_MAGIC: [u8; 4] = *b"NSET";

/// Nesting limit for binary values.
const MAX_DEPTH: usize = 64;

const TEXT_HEADER: &str = "\
; Engine configuration file.
; It's best edited through the engine tools and not directly,
; since the parameters that go here are not all obvious.
;
; Format:
;   [section] ; section goes between []
;   param=value ; assign values to parameters
";

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Parses a text settings file. `path` only labels errors.
pub(crate) fn parse_text(path: &str, text: &str) -> Result<Vec<(String, Value)>, SettingsError> {
    let parse_error = |line: usize, message: String| SettingsError::Parse {
        path: path.to_string(),
        line,
        message,
    };

    let mut entries = Vec::new();
    let mut section = String::new();
    // Key, first line number and accumulated value text of a multi-line value.
    let mut pending: Option<(String, usize, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;

        if let Some((key, start, mut buffer)) = pending.take() {
            buffer.push('\n');
            buffer.push_str(raw);
            if brackets_balanced(&buffer) {
                let value = parse_value(&buffer).map_err(|m| parse_error(start, m))?;
                entries.push((key, value));
            } else {
                pending = Some((key, start, buffer));
            }
            continue;
        }

        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let Some(end) = header.find(']') else {
                return Err(parse_error(line_no, "unterminated section header".to_string()));
            };
            section = header[..end].trim().to_string();
            continue;
        }

        let (key, value_text) = split_assignment(line).map_err(|m| parse_error(line_no, m))?;
        let name = if section.is_empty() {
            key
        } else {
            format!("{section}/{key}")
        };

        if brackets_balanced(value_text) {
            let value = parse_value(value_text).map_err(|m| parse_error(line_no, m))?;
            entries.push((name, value));
        } else {
            pending = Some((name, line_no, value_text.to_string()));
        }
    }

    if let Some((key, start, _)) = pending {
        return Err(parse_error(start, format!("unterminated value for '{key}'")));
    }

    Ok(entries)
}

fn split_assignment(line: &str) -> Result<(String, &str), String> {
    if line.starts_with('"') {
        let end = quoted_end(line).ok_or_else(|| "unterminated quoted key".to_string())?;
        let key: String = ron::from_str(&line[..end]).map_err(|e| e.to_string())?;
        let rest = line[end..].trim_start();
        let value = rest
            .strip_prefix('=')
            .ok_or_else(|| format!("expected '=' after key '{key}'"))?;
        return Ok((key, value));
    }

    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| format!("expected 'key=value', got '{line}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty key".to_string());
    }
    Ok((key.to_string(), value))
}

/// Byte index just past the closing quote of the string starting at 0.
fn quoted_end(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn parse_value(text: &str) -> Result<Value, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("missing value".to_string());
    }
    Value::from_ron(text).map_err(|e| e.to_string())
}

/// Returns `true` unless a string or bracket opened in `text` is still open.
fn brackets_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_string
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '+' | '-'))
}

fn is_plain_section(section: &str) -> bool {
    is_plain_key(section) && !section.contains('/')
}

/// Encodes settings as text, grouped by the first `/` segment of each name.
///
/// `entries` must not contain `config_version`; it is written first.
pub(crate) fn write_text(
    config_version: i64,
    entries: &[(String, Value)],
) -> Result<String, SettingsError> {
    let mut sections: BTreeMap<&str, Vec<(&str, &Value)>> = BTreeMap::new();
    for (name, value) in entries {
        // Names whose section would not read back as one stay at top level.
        let (section, key) = match name.split_once('/') {
            Some((section, key)) if is_plain_section(section) => (section, key),
            _ => ("", name.as_str()),
        };
        sections.entry(section).or_default().push((key, value));
    }

    let mut out = String::from(TEXT_HEADER);
    let _ = writeln!(out, "\nconfig_version={config_version}");

    for (section, keys) in sections {
        if !section.is_empty() {
            let _ = writeln!(out, "\n[{section}]\n");
        }
        for (key, value) in keys {
            let value = ron::to_string(value)?;
            if is_plain_key(key) {
                let _ = writeln!(out, "{key}={value}");
            } else {
                let _ = writeln!(out, "{}={value}", ron::to_string(key)?);
            }
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

/// Encodes settings in the NSET binary format, `config_version` first.
pub(crate) fn write_binary(config_version: i64, entries: &[(String, Value)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&BINARY_MAGIC);
    buf.extend_from_slice(&((entries.len() + 1) as u32).to_le_bytes());

    let version = Value::Int(config_version);
    let all = std::iter::once(("config_version", &version))
        .chain(entries.iter().map(|(n, v)| (n.as_str(), v)));
    for (name, value) in all {
        write_str(&mut buf, name);
        let mut encoded = Vec::new();
        encode_value(&mut encoded, value);
        buf.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        buf.extend_from_slice(&encoded);
    }
    buf
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Nil => buf.push(0),
        Value::Bool(b) => {
            buf.push(1);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(2);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            buf.push(3);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(4);
            write_str(buf, s);
        }
        Value::Array(items) => {
            buf.push(5);
            buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Map(map) => {
            buf.push(6);
            buf.extend_from_slice(&(map.len() as u32).to_le_bytes());
            for (key, item) in map {
                write_str(buf, key);
                encode_value(buf, item);
            }
        }
        Value::Bytes(bytes) => {
            buf.push(7);
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
    }
}

/// Returns `true` if `data` starts with the binary settings magic.
pub(crate) fn is_binary(data: &[u8]) -> bool {
    data.starts_with(&BINARY_MAGIC)
}

/// Decodes an NSET file.
pub(crate) fn parse_binary(data: &[u8]) -> Result<Vec<(String, Value)>, SettingsError> {
    if !is_binary(data) {
        return Err(SettingsError::InvalidBinary("invalid magic bytes".to_string()));
    }
    let mut reader = Reader { data, pos: 4 };
    let count = reader.u32()? as usize;

    // Each entry needs at least its two length prefixes.
    let mut entries = Vec::with_capacity(count.min(data.len() / 8));
    for _ in 0..count {
        let name = reader.string()?;
        let len = reader.u32()? as usize;
        let payload = reader.take(len)?;
        let mut value_reader = Reader { data: payload, pos: 0 };
        let value = value_reader.value(0)?;
        if value_reader.pos != payload.len() {
            return Err(SettingsError::InvalidBinary(format!(
                "trailing bytes in value of '{name}'"
            )));
        }
        entries.push((name, value));
    }
    Ok(entries)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], SettingsError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                SettingsError::InvalidBinary(format!(
                    "data truncated: expected {len} bytes at offset {}",
                    self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SettingsError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SettingsError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, SettingsError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, SettingsError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SettingsError::InvalidBinary("string is not valid UTF-8".to_string()))
    }

    fn value(&mut self, depth: usize) -> Result<Value, SettingsError> {
        if depth > MAX_DEPTH {
            return Err(SettingsError::InvalidBinary("values nested too deeply".to_string()));
        }
        let value = match self.u8()? {
            0 => Value::Nil,
            1 => Value::Bool(self.u8()? != 0),
            2 => Value::Int(i64::from_le_bytes(self.array()?)),
            3 => Value::Float(f64::from_le_bytes(self.array()?)),
            4 => Value::String(self.string()?),
            5 => {
                let count = self.u32()? as usize;
                let mut items = Vec::with_capacity(count.min(self.data.len() - self.pos));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                Value::Array(items)
            }
            6 => {
                let count = self.u32()?;
                let mut map = BTreeMap::new();
                for _ in 0..count {
                    let key = self.string()?;
                    map.insert(key, self.value(depth + 1)?);
                }
                Value::Map(map)
            }
            7 => {
                let len = self.u32()? as usize;
                Value::Bytes(self.take(len)?.to_vec())
            }
            tag => {
                return Err(SettingsError::InvalidBinary(format!("unknown value tag {tag}")));
            }
        };
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
