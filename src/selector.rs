//! Weighted random topic selection.
//!
//! Every topic starts from an equal share of 100 points. Each past grade moves the
//! share by one point: up for strong grades (4–5), down for weak ones. The resulting
//! score is floored at 1 so no topic ever drops out of rotation.
//!
//! The random source is passed in, so callers (and tests) control determinism.

use rand::Rng;

use crate::domain::TopicWithGrades;

/// Total points shared by the pool before history is applied.
const POOL_POINTS: f64 = 100.0;
/// Lowest weight a topic can reach.
const WEIGHT_FLOOR: f64 = 1.0;

/// Selection weight of every topic, in pool order.
pub fn topic_weights(pool: &[TopicWithGrades]) -> Vec<f64> {
  if pool.is_empty() {
    return Vec::new();
  }
  let base = POOL_POINTS / pool.len() as f64;
  pool
    .iter()
    .map(|t| {
      let drift: i64 = t.grades.iter().map(|g| if g.is_strong() { 1 } else { -1 }).sum();
      (base + drift as f64).max(WEIGHT_FLOOR)
    })
    .collect()
}

/// Pick one topic from the pool. `None` only when the pool is empty.
pub fn choose_topic<'a, R: Rng + ?Sized>(
  pool: &'a [TopicWithGrades],
  rng: &mut R,
) -> Option<&'a TopicWithGrades> {
  let weights = topic_weights(pool);
  if weights.is_empty() {
    return None;
  }
  let total: f64 = weights.iter().sum();
  let draw = rng.gen::<f64>() * total;
  pick_weighted(&weights, draw).map(|idx| &pool[idx])
}

/// Walk the weights subtracting each from `draw`; the first index where the
/// remainder goes negative wins. Rounding leftovers fall to the last index.
fn pick_weighted(weights: &[f64], draw: f64) -> Option<usize> {
  if weights.is_empty() {
    return None;
  }
  let mut remainder = draw;
  for (idx, w) in weights.iter().enumerate() {
    remainder -= w;
    if remainder < 0.0 {
      return Some(idx);
    }
  }
  Some(weights.len() - 1)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Grade, Topic, TopicType};
  use proptest::prelude::*;
  use rand::SeedableRng;
  use rand_chacha::ChaCha8Rng;

  fn topic(id: i64, grades: &[i64]) -> TopicWithGrades {
    TopicWithGrades {
      topic: Topic {
        id,
        topic_type: TopicType::Grammar,
        language: "German".into(),
        name: format!("T{id}"),
        level: "C2".into(),
        level_number: 6,
      },
      grades: grades.iter().filter_map(|g| Grade::new(*g)).collect(),
    }
  }

  #[test]
  fn untouched_pool_has_equal_weights() {
    let pool: Vec<_> = (1..=4).map(|id| topic(id, &[])).collect();
    assert_eq!(topic_weights(&pool), vec![25.0; 4]);
  }

  #[test]
  fn history_shifts_weight_by_one_per_grade() {
    let pool = vec![topic(1, &[5, 5, 2]), topic(2, &[])];
    assert_eq!(topic_weights(&pool), vec![51.0, 50.0]);
  }

  #[test]
  fn weight_never_drops_below_floor() {
    let pool = vec![topic(1, &[1; 120]), topic(2, &[])];
    assert_eq!(topic_weights(&pool), vec![1.0, 50.0]);
  }

  #[test]
  fn empty_pool_selects_nothing() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    assert!(choose_topic(&[], &mut rng).is_none());
  }

  #[test]
  fn single_topic_is_always_chosen() {
    let pool = vec![topic(9, &[1, 1, 1])];
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for _ in 0..20 {
      assert_eq!(choose_topic(&pool, &mut rng).map(|t| t.topic.id), Some(9));
    }
  }

  #[test]
  fn two_fresh_topics_are_drawn_evenly() {
    let pool = vec![topic(1, &[]), topic(2, &[])];
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut first = 0;
    for _ in 0..1000 {
      if choose_topic(&pool, &mut rng).map(|t| t.topic.id) == Some(1) {
        first += 1;
      }
    }
    assert!((450..=550).contains(&first), "first topic drawn {first} times");
  }

  #[test]
  fn weak_topics_dominate_mastered_ones() {
    let pool = vec![topic(1, &[5; 60]), topic(2, &[1; 60])];
    // 50 + 60 = 110 against max(1, 50 - 60) = 1
    assert_eq!(topic_weights(&pool), vec![110.0, 1.0]);
    let pool = vec![topic(1, &[1; 45]), topic(2, &[5; 45])];
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let picks_weak = (0..1000)
      .filter(|_| choose_topic(&pool, &mut rng).map(|t| t.topic.id) == Some(2))
      .count();
    // weights 5 vs 95
    assert!(picks_weak > 900, "stronger-weighted topic drawn {picks_weak} times");
  }

  #[test]
  fn pick_walks_in_order_and_closes_the_interval() {
    let weights = [10.0, 20.0, 30.0];
    assert_eq!(pick_weighted(&weights, 0.0), Some(0));
    assert_eq!(pick_weighted(&weights, 9.999), Some(0));
    assert_eq!(pick_weighted(&weights, 10.0), Some(1));
    assert_eq!(pick_weighted(&weights, 59.9), Some(2));
    assert_eq!(pick_weighted(&weights, 60.0), Some(2));
    assert_eq!(pick_weighted(&[], 0.0), None);
  }

  proptest! {
    #[test]
    fn weights_respect_floor_and_formula(
      histories in proptest::collection::vec(proptest::collection::vec(1i64..=5, 0..40), 1..12)
    ) {
      let pool: Vec<_> = histories
        .iter()
        .enumerate()
        .map(|(i, g)| topic(i as i64, g))
        .collect();
      let base = 100.0 / pool.len() as f64;
      for (t, w) in pool.iter().zip(topic_weights(&pool)) {
        let drift: i64 = t.grades.iter().map(|g| if g.value() >= 4 { 1 } else { -1 }).sum();
        prop_assert!(w >= 1.0);
        prop_assert_eq!(w, (base + drift as f64).max(1.0));
      }
    }
  }
}
