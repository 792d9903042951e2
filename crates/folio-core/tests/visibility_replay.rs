//! Integration tests for reveal gating.

use folio_core::visibility::*;
use proptest::prelude::*;

proptest! {
    /// The tracker always reports the last observation, and the number of
    /// reveals equals the number of hidden -> visible transitions.
    #[test]
    fn level_triggered_with_replayable_reveals(
        ratios in proptest::collection::vec(0.0f64..=1.0, 0..64),
        threshold in 0.0f64..=1.0,
    ) {
        let mut tracker: VisibilityTracker = VisibilityTracker::default();
        tracker.register("hero", (), threshold);

        let mut previous = false;
        let mut expected_reveals = 0usize;
        for ratio in &ratios {
            let now = *ratio >= threshold;
            if now && !previous {
                expected_reveals += 1;
            }
            let flipped = tracker.record_ratio("hero", *ratio);
            prop_assert_eq!(flipped, now != previous);
            prop_assert_eq!(tracker.is_visible("hero"), now);
            previous = now;
        }

        let reveals = tracker
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, VisibilityEvent::Revealed(_)))
            .count();
        prop_assert_eq!(reveals, expected_reveals);

        let mut taken = 0usize;
        while tracker.take_reveal("hero") {
            taken += 1;
        }
        prop_assert_eq!(taken, expected_reveals);
    }
}

#[test]
fn regions_are_independent() {
    let mut tracker: VisibilityTracker = VisibilityTracker::default();
    tracker.register_default("project-1", ());
    tracker.register_default("project-2", ());

    tracker.record("project-2", true);
    tracker.record("project-1", true);
    tracker.record("project-2", false);

    let states: Vec<(&str, bool)> = tracker.states().collect();
    assert_eq!(states, vec![("project-1", true), ("project-2", false)]);
    assert_eq!(
        tracker.drain_events(),
        vec![
            VisibilityEvent::Revealed("project-2".into()),
            VisibilityEvent::Revealed("project-1".into()),
            VisibilityEvent::Hidden("project-2".into()),
        ]
    );
}
