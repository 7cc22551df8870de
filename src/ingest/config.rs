// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Load an ordered keyword list from a file. Supports TOML (`keywords = [..]`) or a JSON array.
pub fn load_keywords_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading keywords from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_keywords(&content, ext.as_str())
}

/// Comma-separated list, as accepted in `KEYWORDS`.
pub fn split_list(raw: &str) -> Vec<String> {
    clean_list(raw.split(',').map(str::to_string))
}

fn parse_keywords(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("keywords");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported keywords file format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlKeywords {
        keywords: Vec<String>,
    }
    let v: TomlKeywords = toml::from_str(s)?;
    Ok(clean_list(v.keywords))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop empties, drop repeats. First occurrence keeps its position.
pub fn clean_list<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|k| k == t) {
            out.push(t.to_string());
        }
    }
    out
}
