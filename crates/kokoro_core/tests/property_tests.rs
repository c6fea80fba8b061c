//! Property tests for the desire scheduler invariants.

use kokoro_core::desire::{decayed_satisfaction, Desire, DesireStore};
use proptest::prelude::*;

fn arb_desire(idx: usize) -> impl Strategy<Value = Desire> {
    (
        0.0f32..=1.0,
        0.0f32..=2.0,
        0.0f32..=0.1,
        0i64..100_000,
    )
        .prop_map(move |(satisfaction, base_importance, decay_rate, last)| Desire {
            id: format!("desire.{}", idx),
            label: format!("desire {}", idx),
            description: String::new(),
            satisfaction,
            base_importance,
            decay_rate,
            last_satisfied_at: last,
            capabilities: vec![],
            prompts: vec![],
        })
}

fn arb_catalog() -> impl Strategy<Value = Vec<Desire>> {
    (1usize..6).prop_flat_map(|n| (0..n).map(arb_desire).collect::<Vec<_>>())
}

/// A step in an arbitrary interaction history.
#[derive(Debug, Clone)]
enum Op {
    /// Advance time by this many seconds and tick.
    Tick(i64),
    /// Satisfy desire index by amount.
    Satisfy(usize, f32),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0i64..86_400).prop_map(Op::Tick),
            ((0usize..6), (0.0f32..=1.5)).prop_map(|(i, a)| Op::Satisfy(i, a)),
        ],
        0..40,
    )
}

proptest! {
    /// Satisfaction stays in [0, 1] after any sequence of tick/satisfy calls.
    #[test]
    fn satisfaction_always_in_unit_interval(catalog in arb_catalog(), ops in arb_ops()) {
        let n = catalog.len();
        let mut store = DesireStore::new(catalog, 0, 0.95);
        let mut now = 0i64;

        for op in ops {
            match op {
                Op::Tick(dt) => {
                    now += dt;
                    store.tick(now);
                }
                Op::Satisfy(i, amount) => {
                    let id = store.desires()[i % n].id.clone();
                    store.satisfy(&id, amount, now).unwrap();
                }
            }
            for d in store.desires() {
                prop_assert!((0.0..=1.0).contains(&d.satisfaction),
                    "satisfaction {} out of range for {}", d.satisfaction, d.id);
            }
        }
    }

    /// Calling tick twice with the same now equals calling it once.
    #[test]
    fn tick_is_idempotent(catalog in arb_catalog(), dt in 1i64..1_000_000) {
        let mut once = DesireStore::new(catalog.clone(), 0, 0.95);
        once.tick(dt);

        let mut twice = DesireStore::new(catalog, 0, 0.95);
        twice.tick(dt);
        twice.tick(dt);

        for (a, b) in once.desires().iter().zip(twice.desires()) {
            prop_assert_eq!(a.satisfaction, b.satisfaction);
        }
    }

    /// Decay never increases satisfaction between satisfy events.
    #[test]
    fn decay_is_monotonic_non_increasing(
        value in 0.0f32..=1.0,
        rate in 0.0f32..=0.2,
        m1 in 0.0f64..1_000.0,
        m2 in 0.0f64..1_000.0,
    ) {
        let (short, long) = if m1 <= m2 { (m1, m2) } else { (m2, m1) };
        prop_assert!(decayed_satisfaction(value, rate, long)
            <= decayed_satisfaction(value, rate, short));
    }

    /// select_active is deterministic for a fixed store state.
    #[test]
    fn selection_is_deterministic(catalog in arb_catalog()) {
        let store = DesireStore::new(catalog, 0, 0.95);
        let first = store.select_active().map(|d| d.id.clone());
        for _ in 0..5 {
            prop_assert_eq!(store.select_active().map(|d| d.id.clone()), first.clone());
        }
    }
}
