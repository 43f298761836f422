//! Response parser: coerces unstable LLM output shapes into canonical
//! segment lists / translation records. Spec §4.B, §9 ("a ladder, not a
//! choice" — every fallback is attempted in order).
//!
//! Grounded on the teacher's `src/openai.rs` defensive-helper style
//! (`cjk_ratio`, `has_task_words_en/zh`, the multi-attempt structure already
//! present in `translate_to_en`), generalized into the explicit ladder spec
//! §4.B requires.

use serde::Deserialize;

/// Parses a segmentation response into an ordered list of Chinese segments,
/// trying each strategy below in order until one yields a non-empty list.
pub fn parse_segments(raw: &str) -> Vec<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return vec![];
  }

  // 1 & 2: bare JSON array, or an object with a `segments` key.
  if let Some(segs) = try_json_segments(trimmed) {
    return filter_metadata_tokens(segs);
  }

  // 3: markdown-fenced code block wrapping either shape above.
  if let Some(inner) = strip_fence(trimmed) {
    if let Some(segs) = try_json_segments(&inner) {
      return filter_metadata_tokens(segs);
    }
  }

  // 4: bare `segments:` prefix followed by JSON or newline-separated values.
  if let Some(rest) = strip_segments_prefix(trimmed) {
    if let Some(segs) = try_json_segments(rest.trim()) {
      return filter_metadata_tokens(segs);
    }
    let lines: Vec<String> = rest
      .lines()
      .map(|l| l.trim())
      .filter(|l| !l.is_empty())
      .map(|l| l.to_string())
      .collect();
    if !lines.is_empty() {
      return filter_metadata_tokens(lines);
    }
  }

  // 5: freeform text containing the first bracket-balanced `[...]` array.
  if let Some(bracketed) = extract_balanced_brackets(trimmed) {
    if let Some(segs) = try_json_segments(&bracketed) {
      return filter_metadata_tokens(segs);
    }
  }

  // 6: final fallback — split on whitespace/comma/pipe.
  let split: Vec<String> = trimmed
    .split(|c: char| c.is_whitespace() || c == ',' || c == '|')
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string())
    .collect();
  filter_metadata_tokens(split)
}

fn try_json_segments(s: &str) -> Option<Vec<String>> {
  if let Ok(arr) = serde_json::from_str::<Vec<String>>(s) {
    return Some(arr);
  }
  #[derive(Deserialize)]
  struct Wrapper {
    segments: Vec<String>,
  }
  if let Ok(w) = serde_json::from_str::<Wrapper>(s) {
    return Some(w.segments);
  }
  None
}

/// Strips a single level of ```...``` / ```lang\n...\n``` fencing.
fn strip_fence(s: &str) -> Option<String> {
  let s = s.trim();
  if !s.starts_with("```") {
    return None;
  }
  let without_open = &s[3..];
  let without_open = without_open.strip_prefix('\n').unwrap_or_else(|| {
    without_open.find('\n').map(|i| &without_open[i + 1..]).unwrap_or(without_open)
  });
  let inner = without_open.strip_suffix("```").unwrap_or(without_open);
  Some(inner.trim().to_string())
}

fn strip_segments_prefix(s: &str) -> Option<String> {
  let lower = s.to_lowercase();
  if let Some(rest) = lower.strip_prefix("segments:") {
    let start = s.len() - rest.len();
    return Some(s[start..].trim().to_string());
  }
  None
}

/// Extracts the first bracket-balanced `[...]` span from freeform text.
fn extract_balanced_brackets(s: &str) -> Option<String> {
  let start = s.find('[')?;
  let bytes = s.as_bytes();
  let mut depth = 0i32;
  for (i, &b) in bytes.iter().enumerate().skip(start) {
    if b == b'[' {
      depth += 1;
    } else if b == b']' {
      depth -= 1;
      if depth == 0 {
        return Some(s[start..=i].to_string());
      }
    }
  }
  None
}

/// Drops tokens that are exactly a metadata marker (`segments` or
/// `segments:`, case-insensitive, trimmed) — but only when the whole token
/// matches; a real segment that merely contains the substring is preserved.
fn filter_metadata_tokens(tokens: Vec<String>) -> Vec<String> {
  tokens
    .into_iter()
    .filter(|t| {
      let norm = t.trim().to_lowercase();
      norm != "segments" && norm != "segments:"
    })
    .collect()
}

/// One parsed `{pinyin, english}` translation record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTranslation {
  pub pinyin: String,
  pub english: String,
}

/// Parses a single segment's translation response. Accepts a JSON
/// `{pinyin, english}` object; otherwise strips leading `pinyin:`/`english:`
/// labels and outer parentheses from freeform text.
pub fn parse_translation(raw: &str) -> ParsedTranslation {
  let trimmed = raw.trim();

  #[derive(Deserialize)]
  struct Obj {
    #[serde(default)]
    pinyin: String,
    #[serde(default)]
    english: String,
  }
  if let Ok(obj) = serde_json::from_str::<Obj>(trimmed) {
    if !obj.pinyin.is_empty() || !obj.english.is_empty() {
      return ParsedTranslation {
        pinyin: normalize_model_field(&obj.pinyin),
        english: normalize_model_field(&obj.english),
      };
    }
  }

  // Freeform: look for "pinyin: ..." / "english: ..." lines, else treat the
  // whole response as the english gloss.
  let mut pinyin = String::new();
  let mut english = String::new();
  for line in trimmed.lines() {
    let l = line.trim();
    let lower = l.to_lowercase();
    if let Some(rest) = lower.strip_prefix("pinyin:") {
      let start = l.len() - rest.len();
      pinyin = normalize_model_field(l[start..].trim());
    } else if let Some(rest) = lower.strip_prefix("english:") {
      let start = l.len() - rest.len();
      english = normalize_model_field(l[start..].trim());
    }
  }
  if english.is_empty() && pinyin.is_empty() {
    english = normalize_model_field(trimmed);
  }
  ParsedTranslation { pinyin, english }
}

/// Trims one level of surrounding whitespace and one level of outer
/// parentheses/brackets.
pub fn normalize_model_field(s: &str) -> String {
  let t = s.trim();
  let t = t.strip_prefix('(').and_then(|r| r.strip_suffix(')')).unwrap_or(t);
  let t = t.strip_prefix('"').and_then(|r| r.strip_suffix('"')).unwrap_or(t);
  t.trim().to_string()
}

/// Parses a `TranslateFull` response: accepts `{translation: ...}` JSON or
/// raw text, returning the trimmed string either way.
pub fn parse_full_translation(raw: &str) -> String {
  let trimmed = raw.trim();
  #[derive(Deserialize)]
  struct Wrapper {
    translation: String,
  }
  if let Ok(w) = serde_json::from_str::<Wrapper>(trimmed) {
    return w.translation.trim().to_string();
  }
  trimmed.trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_bare_json_array() {
    assert_eq!(parse_segments(r#"["你好", "世界"]"#), vec!["你好", "世界"]);
  }

  #[test]
  fn parses_object_with_segments_key() {
    assert_eq!(parse_segments(r#"{"segments": ["你好", "世界"]}"#), vec!["你好", "世界"]);
  }

  #[test]
  fn parses_fenced_json_array() {
    let raw = "```json\n[\"你好\", \"世界\"]\n```";
    assert_eq!(parse_segments(raw), vec!["你好", "世界"]);
  }

  #[test]
  fn parses_segments_prefix_with_newlines() {
    let raw = "segments:\n你好\n世界";
    assert_eq!(parse_segments(raw), vec!["你好", "世界"]);
  }

  #[test]
  fn extracts_bracketed_array_from_freeform() {
    let raw = "Sure, here it is: [\"你好\", \"世界\"] hope that helps!";
    assert_eq!(parse_segments(raw), vec!["你好", "世界"]);
  }

  #[test]
  fn final_fallback_splits_on_whitespace_comma_pipe() {
    assert_eq!(parse_segments("你好, 世界|你"), vec!["你好", "世界", "你"]);
  }

  #[test]
  fn metadata_token_filtered_only_on_exact_match() {
    let raw = r#"["segments", "segments:", "a segments reference"]"#;
    assert_eq!(parse_segments(raw), vec!["a segments reference"]);
  }

  #[test]
  fn empty_input_returns_empty() {
    assert_eq!(parse_segments(""), Vec::<String>::new());
    assert_eq!(parse_segments("   "), Vec::<String>::new());
  }

  #[test]
  fn parses_translation_json_object() {
    let t = parse_translation(r#"{"pinyin": "nǐ hǎo", "english": "hello"}"#);
    assert_eq!(t.pinyin, "nǐ hǎo");
    assert_eq!(t.english, "hello");
  }

  #[test]
  fn parses_translation_freeform_labels() {
    let t = parse_translation("pinyin: nǐ hǎo\nenglish: (hello)");
    assert_eq!(t.pinyin, "nǐ hǎo");
    assert_eq!(t.english, "hello");
  }

  #[test]
  fn parses_full_translation_json_and_raw() {
    assert_eq!(parse_full_translation(r#"{"translation": "Hello world"}"#), "Hello world");
    assert_eq!(parse_full_translation("\"Hello world\""), "Hello world");
    assert_eq!(parse_full_translation("Hello world"), "Hello world");
  }
}
