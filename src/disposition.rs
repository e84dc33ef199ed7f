//! Filename extraction from `Content-Disposition` response headers.
//!
//! The conversion endpoint names its result in a header such as
//! `attachment; filename="report.docx"`. Servers in the wild also send the
//! RFC 5987 extended form (`filename*=UTF-8''r%C3%A9sum%C3%A9.pdf`), bare
//! tokens, and occasionally garbage. Everything here is total: a header
//! that cannot be understood yields `None`, and [`derive_filename`] then
//! falls back to a generic name. Nothing in this module returns an error.
//!
//! ## Rules (applied in order)
//!
//! 1. Split parameters on `;` outside quoted strings
//! 2. Prefer `filename*` (charset'lang'percent-encoded) over `filename`
//! 3. Unquote quoted-strings, dropping backslash escapes
//! 4. Strip directory components and stray quotes; reject empty names

use crate::format::FormatId;
use once_cell::sync::Lazy;
use regex::Regex;

/// Stem used when the server does not name the file.
pub const DEFAULT_FALLBACK_STEM: &str = "converted-file";

/// The filename to save a converted file under.
///
/// Uses the header's filename when it has a usable one, otherwise
/// `{fallback_stem}{target}` (e.g. `converted-file.docx`), or the bare stem
/// when no target is known.
pub fn derive_filename(
    header: Option<&str>,
    target: Option<&FormatId>,
    fallback_stem: &str,
) -> String {
    if let Some(name) = header.and_then(filename_from_disposition) {
        return name;
    }
    let stem = if fallback_stem.trim().is_empty() {
        DEFAULT_FALLBACK_STEM
    } else {
        fallback_stem.trim()
    };
    match target {
        Some(ext) => format!("{stem}{}", ext.key()),
        None => stem.to_string(),
    }
}

/// Extract the filename parameter from a `Content-Disposition` value.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let params = split_params(header);

    // ── Rule 2: extended parameter wins ──────────────────────────────────
    let extended = params
        .iter()
        .find(|(k, _)| k == "filename*")
        .and_then(|(_, v)| decode_ext_value(&unquote(v)));
    let plain = || {
        params
            .iter()
            .find(|(k, _)| k == "filename")
            .map(|(_, v)| unquote(v))
    };

    extended
        .and_then(|n| sanitise(&n))
        .or_else(|| plain().and_then(|n| sanitise(&n)))
}

// ── Rule 1: parameter splitting ──────────────────────────────────────────────

/// `key=value` pairs after the disposition type, keys lower-cased, values raw.
fn split_params(header: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in header.chars() {
        match ch {
            _ if escaped => {
                current.push(ch);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return None;
            }
            Some((key, value.trim().to_string()))
        })
        .collect()
}

// ── Rule 3: quoted-string handling ───────────────────────────────────────────

fn unquote(value: &str) -> String {
    let v = value.trim();
    let inner = match v.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"').unwrap_or(rest),
        None => {
            // single quotes are not RFC, but some servers send them
            match v.strip_prefix('\'') {
                Some(rest) => rest.strip_suffix('\'').unwrap_or(rest),
                None => v,
            }
        }
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ── Rule 2 helper: RFC 5987 ext-value ────────────────────────────────────────

static RE_EXT_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)(utf-8|iso-8859-1)'[^']*'(.*)$").unwrap());

fn decode_ext_value(value: &str) -> Option<String> {
    let caps = RE_EXT_VALUE.captures(value)?;
    let charset = caps[1].to_ascii_lowercase();
    let bytes = percent_decode(&caps[2])?;
    if charset == "utf-8" {
        String::from_utf8(bytes).ok()
    } else {
        Some(bytes.into_iter().map(char::from).collect())
    }
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let raw = input.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Some(out)
}

// ── Rule 4: sanitise ─────────────────────────────────────────────────────────

fn sanitise(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| *c != '"' && *c != '\'' && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}
