//! SM-2 spaced-repetition engine (spec §4.G). No corpus precedent exists for
//! this arithmetic (searched the pack's flashcard-adjacent files; none
//! implement scheduling math) — built directly from the spec's explicit
//! formula.

use chrono::{Duration, Utc};

use crate::domain::{Grade, SrsState, VocabStatus};

const MIN_EASE_FACTOR: f64 = 1.3;
const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Recent-lookup window and struggling threshold used by `is_struggling`.
const STRUGGLING_LOOKUP_THRESHOLD: i64 = 3;
/// Window over which opacity decays to its floor absent any struggle signal.
const OPACITY_DECAY_DAYS: f64 = 7.0;
const OPACITY_FLOOR: f64 = 0.2;

/// Runs one SM-2 answer step and returns the new state (unpersisted).
///
/// - `ef' = max(1.3, ef + (0.1 - (5-q)*(0.08 + (5-q)*0.02)))`, `q` mapped
///   from `grade` (Again=0, Hard=3, Good=4, Easy=5).
/// - `q < 3` resets `repetitions=0`, `interval=1d`.
/// - Else `repetitions += 1`; `interval` is `1d` at rep 1, `6d` at rep 2,
///   else `round(prev_interval * ef')`.
pub fn answer(current: &SrsState, grade: Grade) -> SrsState {
  let now = Utc::now();
  let q = grade.q_value();
  let ef = current.ease_factor;
  let ef_prime = (ef + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

  let (repetitions, interval_days) = if q < 3.0 {
    (0, 1)
  } else {
    let reps = current.repetitions + 1;
    let interval = match reps {
      1 => 1,
      2 => 6,
      _ => (current.interval_days.max(1) as f64 * ef_prime).round() as i64,
    };
    (reps, interval)
  };

  SrsState {
    vocab_item_id: current.vocab_item_id.clone(),
    ease_factor: ef_prime,
    interval_days,
    repetitions,
    due_at: now + Duration::days(interval_days),
    last_grade: Some(grade.as_i64()),
    last_reviewed_at: Some(now),
    lookup_count: current.lookup_count,
    last_lookup_at: current.last_lookup_at,
  }
}

/// `is_struggling` = (lookup_count ≥ threshold in the recent window) ∨
/// (last_grade < 2). The window is approximated by the running
/// `lookup_count` maintained by `record_lookup`, which only accumulates
/// while a word remains unmastered.
pub fn is_struggling(state: &SrsState) -> bool {
  state.lookup_count >= STRUGGLING_LOOKUP_THRESHOLD || state.last_grade.map(|g| g < 2).unwrap_or(false)
}

/// UI opacity projection, `[0,1]` (spec §4.G):
/// - `known` ⇒ 0.
/// - `learning` struggling ⇒ 1.0.
/// - else linear decay from 1.0 to a 0.2 floor over `OPACITY_DECAY_DAYS`
///   since `last_reviewed_at` (an explicit Open Question decision — any
///   monotone-decreasing clamped curve satisfies spec §8's opacity bounds).
pub fn opacity(status: &VocabStatus, state: &SrsState) -> f64 {
  if *status == VocabStatus::Known {
    return 0.0;
  }
  if is_struggling(state) {
    return 1.0;
  }
  match state.last_reviewed_at {
    None => 1.0,
    Some(last) => {
      let days_since = (Utc::now() - last).num_seconds() as f64 / 86_400.0;
      let frac = (days_since / OPACITY_DECAY_DAYS).clamp(0.0, 1.0);
      (1.0 - frac * (1.0 - OPACITY_FLOOR)).clamp(OPACITY_FLOOR, 1.0)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fresh_state() -> SrsState {
    SrsState { vocab_item_id: "v1".into(), ..Default::default() }
  }

  #[test]
  fn good_answers_follow_1_6_round_progression() {
    let s0 = fresh_state();
    let s1 = answer(&s0, Grade::Good);
    assert_eq!(s1.repetitions, 1);
    assert_eq!(s1.interval_days, 1);

    let s2 = answer(&s1, Grade::Good);
    assert_eq!(s2.repetitions, 2);
    assert_eq!(s2.interval_days, 6);

    let s3 = answer(&s2, Grade::Good);
    assert_eq!(s3.repetitions, 3);
    assert_eq!(s3.interval_days, (6.0 * s2.ease_factor).round() as i64);
  }

  #[test]
  fn again_resets_repetitions_and_interval() {
    let mut s = fresh_state();
    s.repetitions = 4;
    s.interval_days = 20;
    let next = answer(&s, Grade::Again);
    assert_eq!(next.repetitions, 0);
    assert_eq!(next.interval_days, 1);
  }

  #[test]
  fn ease_factor_never_drops_below_floor() {
    let mut s = fresh_state();
    s.ease_factor = MIN_EASE_FACTOR;
    for _ in 0..10 {
      s = answer(&s, Grade::Again);
      assert!(s.ease_factor >= MIN_EASE_FACTOR);
    }
  }

  #[test]
  fn known_status_has_zero_opacity() {
    let s = fresh_state();
    assert_eq!(opacity(&VocabStatus::Known, &s), 0.0);
  }

  #[test]
  fn struggling_state_is_fully_opaque() {
    let mut s = fresh_state();
    s.lookup_count = STRUGGLING_LOOKUP_THRESHOLD;
    assert_eq!(opacity(&VocabStatus::Learning, &s), 1.0);
  }

  #[test]
  fn opacity_stays_within_bounds() {
    let mut s = fresh_state();
    s.last_reviewed_at = Some(Utc::now() - Duration::days(30));
    let o = opacity(&VocabStatus::Learning, &s);
    assert!(o >= OPACITY_FLOOR && o <= 1.0);
  }
}
