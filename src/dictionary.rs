//! CC-CEDICT dictionary: loaded once at startup, answers word/character
//! lookups and composes segment pinyin without the LLM when unambiguous.
//! Spec §4.A.
//!
//! Grounded on the teacher's `src/pinyin.rs` for the CJK-spacing idiom
//! (`crate::util::is_cjk`), generalized into real CEDICT parsing since the
//! teacher only ever looked pinyin up per-character via the external
//! `pinyin` crate's built-in table.

use std::collections::HashMap;

use crate::domain::DictEntry;
use crate::util::is_cjk;

/// In-memory CC-CEDICT index, keyed by the simplified headword. Multiple
/// entries per key are retained in load order (spec §4.A).
#[derive(Debug, Default)]
pub struct Dictionary {
  by_simplified: HashMap<String, Vec<DictEntry>>,
}

impl Dictionary {
  /// Loads CC-CEDICT from `path`. Tolerates a missing file: logs a warning
  /// and serves an empty dictionary rather than failing startup.
  #[tracing::instrument(level = "info", target = "dictionary", skip(path), fields(path = %path))]
  pub fn load(path: &str) -> Self {
    let content = match std::fs::read_to_string(path) {
      Ok(c) => c,
      Err(e) => {
        tracing::warn!(target: "dictionary", error = %e, "CC-CEDICT file not found or unreadable; serving empty dictionary.");
        return Dictionary::default();
      }
    };

    let mut by_simplified: HashMap<String, Vec<DictEntry>> = HashMap::new();
    let mut count = 0usize;
    for line in content.lines() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      if let Some(entry) = parse_cedict_line(line) {
        by_simplified.entry(entry.simplified.clone()).or_default().push(entry);
        count += 1;
      }
    }
    tracing::info!(target: "dictionary", entries = count, "CC-CEDICT loaded.");
    Dictionary { by_simplified }
  }

  /// All entries for `word`, in load order.
  pub fn lookup(&self, word: &str) -> &[DictEntry] {
    self.by_simplified.get(word).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Convenience: the first entry for `word`, if any.
  pub fn lookup_first(&self, word: &str) -> Option<&DictEntry> {
    self.by_simplified.get(word).and_then(|v| v.first())
  }

  /// True iff `ch` has multiple entries whose base syllables (tone numbers
  /// stripped, `ü` normalized) differ. Tone-5 (neutral) entries are excluded
  /// so particles like 吗 don't trigger ambiguity.
  pub fn is_char_ambiguous(&self, ch: char) -> bool {
    let key = ch.to_string();
    let entries = match self.by_simplified.get(&key) {
      Some(e) => e,
      None => return false,
    };
    let mut bases: Vec<String> = Vec::new();
    for e in entries {
      for syl in e.pinyin_numbered.split_whitespace() {
        if syl.ends_with('5') {
          continue;
        }
        let base = base_syllable(syl);
        if !bases.contains(&base) {
          bases.push(base);
        }
      }
    }
    bases.len() > 1
  }

  /// Preferred single-character pinyin: prefers a tone-5 (neutral) reading
  /// when present; else the first entry's tone-mark pinyin.
  pub fn preferred_char_pinyin(&self, ch: char) -> Option<(String, bool)> {
    let key = ch.to_string();
    let entries = self.by_simplified.get(&key)?;
    for e in entries {
      if e.pinyin_numbered.split_whitespace().any(|s| s.ends_with('5')) {
        return Some((e.pinyin.clone(), true));
      }
    }
    entries.first().map(|e| (e.pinyin.clone(), true))
  }

  /// Resolves a segment's pinyin without the LLM when either:
  /// (a) the whole segment has a single dictionary entry whose readings are
  ///     non-distinct, or
  /// (b) every CJK character in the segment is unambiguous.
  /// Returns `None` whenever any component is ambiguous or any CJK character
  /// is unknown (spec §4.A).
  pub fn compose_segment_pinyin(&self, segment: &str) -> Option<String> {
    if let Some(entries) = self.by_simplified.get(segment) {
      if entries.len() == 1 {
        return Some(entries[0].pinyin.clone());
      }
    }

    let mut syllables: Vec<String> = Vec::new();
    for ch in segment.chars() {
      if !is_cjk(ch) {
        continue;
      }
      if self.is_char_ambiguous(ch) {
        return None;
      }
      match self.preferred_char_pinyin(ch) {
        Some((py, _)) => syllables.push(py),
        None => return None,
      }
    }
    if syllables.is_empty() {
      return None;
    }
    Some(syllables.join(" "))
  }
}

/// Parses one CC-CEDICT line: `TRAD SIMP [numbered-pinyin] /def1/def2/.../`.
fn parse_cedict_line(line: &str) -> Option<DictEntry> {
  let bracket_start = line.find('[')?;
  let bracket_end = line.find(']')?;
  if bracket_end <= bracket_start {
    return None;
  }
  let head = &line[..bracket_start];
  let mut head_parts = head.split_whitespace();
  let traditional = head_parts.next()?.to_string();
  let simplified = head_parts.next()?.to_string();

  let pinyin_numbered = line[bracket_start + 1..bracket_end].trim().to_string();
  let pinyin = numbered_to_tone_marks(&pinyin_numbered);

  let rest = &line[bracket_end + 1..];
  let definition: String = rest
    .split('/')
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" / ");

  Some(DictEntry { traditional, simplified, pinyin_numbered, pinyin, definition })
}

/// Strips the trailing tone digit and normalizes `u:`/`v` -> `v` so two
/// syllables that differ only by tone compare equal.
fn base_syllable(syl: &str) -> String {
  let mut s = syl.to_string();
  if let Some(last) = s.chars().last() {
    if last.is_ascii_digit() {
      s.pop();
    }
  }
  s.replace("u:", "v")
}

const TONE_MARKS: [[char; 5]; 6] = [
  ['a', 'ā', 'á', 'ǎ', 'à'],
  ['e', 'ē', 'é', 'ě', 'è'],
  ['i', 'ī', 'í', 'ǐ', 'ì'],
  ['o', 'ō', 'ó', 'ǒ', 'ò'],
  ['u', 'ū', 'ú', 'ǔ', 'ù'],
  ['v', 'ǖ', 'ǘ', 'ǚ', 'ǜ'],
];

fn toned_char(base: char, tone: usize) -> char {
  for row in TONE_MARKS.iter() {
    if row[0] == base {
      return row[tone];
    }
  }
  base
}

/// Converts a whole numbered-pinyin string (e.g. `"zhong1 guo2 ren2"`) into
/// tone-mark form, following the standard priority: mark `a`, else `e`, else
/// `o` in `ou`, else the last vowel. `u:`/`v` -> `ü`.
pub fn numbered_to_tone_marks(s: &str) -> String {
  s.split_whitespace().map(numbered_syllable_to_tone_marks).collect::<Vec<_>>().join(" ")
}

fn numbered_syllable_to_tone_marks(syl: &str) -> String {
  let mut chars: Vec<char> = syl.chars().collect();
  let tone: usize = match chars.last() {
    Some(c) if c.is_ascii_digit() => {
      let t = c.to_digit(10).unwrap_or(5) as usize;
      chars.pop();
      if t >= 1 && t <= 4 { t } else { 0 }
    }
    _ => 0,
  };

  // Normalize u: / v -> v (stand-in for ü) prior to vowel-priority scan.
  let mut norm: Vec<char> = Vec::with_capacity(chars.len());
  let mut i = 0;
  while i < chars.len() {
    if chars[i] == 'u' && chars.get(i + 1) == Some(&':') {
      norm.push('v');
      i += 2;
    } else if chars[i] == 'v' {
      norm.push('v');
      i += 1;
    } else {
      norm.push(chars[i]);
      i += 1;
    }
  }

  if tone == 0 {
    return norm.iter().collect();
  }

  let idx = pick_tone_vowel_index(&norm);
  match idx {
    Some(i) => {
      let marked = toned_char(norm[i], tone);
      norm[i] = marked;
      norm.iter().collect()
    }
    None => norm.iter().collect(),
  }
}

/// Standard pinyin tone-placement priority: `a`, `e`, `o` (only within
/// `ou`), else the last vowel in the syllable.
fn pick_tone_vowel_index(chars: &[char]) -> Option<usize> {
  if let Some(i) = chars.iter().position(|&c| c == 'a') {
    return Some(i);
  }
  if let Some(i) = chars.iter().position(|&c| c == 'e') {
    return Some(i);
  }
  if let Some(i) = chars.iter().position(|&c| c == 'o') {
    if i + 1 < chars.len() && chars[i + 1] == 'u' {
      return Some(i);
    }
    if !(i > 0 && chars[i - 1] == 'i') {
      return Some(i);
    }
  }
  let vowels = ['a', 'e', 'i', 'o', 'u', 'v'];
  chars.iter().rposition(|c| vowels.contains(c))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tone_mark_priority_a_wins() {
    assert_eq!(numbered_syllable_to_tone_marks("hao3"), "hǎo");
    assert_eq!(numbered_syllable_to_tone_marks("zhong1"), "zhōng");
  }

  #[test]
  fn tone_mark_ou_prefers_o() {
    assert_eq!(numbered_syllable_to_tone_marks("zhou1"), "zhōu");
  }

  #[test]
  fn tone_mark_falls_back_to_last_vowel() {
    assert_eq!(numbered_syllable_to_tone_marks("gui4"), "guì");
  }

  #[test]
  fn tone_mark_neutral_tone_unmarked() {
    assert_eq!(numbered_syllable_to_tone_marks("ma5"), "ma");
    assert_eq!(numbered_syllable_to_tone_marks("le5"), "le");
  }

  #[test]
  fn tone_mark_v_to_umlaut() {
    assert_eq!(numbered_syllable_to_tone_marks("nv3"), "nǚ");
    assert_eq!(numbered_syllable_to_tone_marks("lu:4"), "lǜ");
  }

  #[test]
  fn parses_cedict_line() {
    let line = "你好 你好 [ni3 hao3] /hello/hi/";
    let entry = parse_cedict_line(line).unwrap();
    assert_eq!(entry.simplified, "你好");
    assert_eq!(entry.pinyin, "nǐ hǎo");
    assert_eq!(entry.definition, "hello / hi");
  }

  fn sample_dict() -> Dictionary {
    let mut by_simplified: HashMap<String, Vec<DictEntry>> = HashMap::new();
    by_simplified.insert(
      "吗".into(),
      vec![DictEntry {
        traditional: "嗎".into(),
        simplified: "吗".into(),
        pinyin_numbered: "ma5".into(),
        pinyin: "ma".into(),
        definition: "question particle".into(),
      }],
    );
    by_simplified.insert(
      "行".into(),
      vec![
        DictEntry {
          traditional: "行".into(),
          simplified: "行".into(),
          pinyin_numbered: "xing2".into(),
          pinyin: "xíng".into(),
          definition: "to walk / OK".into(),
        },
        DictEntry {
          traditional: "行".into(),
          simplified: "行".into(),
          pinyin_numbered: "hang2".into(),
          pinyin: "háng".into(),
          definition: "row / profession".into(),
        },
      ],
    );
    Dictionary { by_simplified }
  }

  #[test]
  fn neutral_tone_excluded_from_ambiguity() {
    let d = sample_dict();
    assert!(!d.is_char_ambiguous('吗'));
  }

  #[test]
  fn differing_base_syllables_are_ambiguous() {
    let d = sample_dict();
    assert!(d.is_char_ambiguous('行'));
  }
}
