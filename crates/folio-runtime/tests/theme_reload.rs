//! Preference survives a simulated page reload.

use folio_runtime::{MemoryStorage, PREFERENCE_KEY, Preference, StorageBackend, ThemeResolver};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn preference_survives_reload() {
    let storage = MemoryStorage::new();

    let mut first = ThemeResolver::new(storage.shared(), false);
    first.set_preference(Preference::Dark);
    drop(first);

    let second = ThemeResolver::new(storage.shared(), false);
    assert_eq!(second.preference(), Preference::Dark);
    assert!(second.is_dark());
}

#[test]
fn notifications_follow_change_order() {
    let mut resolver = ThemeResolver::new(MemoryStorage::new(), true);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _sub = {
        let seen = Rc::clone(&seen);
        resolver.subscribe(move |state| seen.borrow_mut().push((state.preference, state.dark)))
    };

    resolver.set_preference(Preference::Light);
    resolver.system_changed(false);
    resolver.set_preference(Preference::System);
    resolver.system_changed(true);

    assert_eq!(
        *seen.borrow(),
        vec![
            (Preference::Light, false),
            (Preference::System, false),
            (Preference::System, true),
        ]
    );
}

#[test]
fn with_tracing_subscriber_installed() {
    use tracing_subscriber::layer::SubscriberExt;

    let subscriber =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new("debug"));
    tracing::subscriber::with_default(subscriber, || {
        let storage = MemoryStorage::with_entry(PREFERENCE_KEY, "bogus");
        let mut resolver = ThemeResolver::new(storage, false);
        resolver.set_preference(Preference::System);
        assert!(!resolver.is_dark());
    });
}

fn preference_strategy() -> impl Strategy<Value = Preference> {
    prop_oneof![
        Just(Preference::Light),
        Just(Preference::Dark),
        Just(Preference::System),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Set(Preference),
    Os(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        preference_strategy().prop_map(Op::Set),
        any::<bool>().prop_map(Op::Os),
    ]
}

proptest! {
    #[test]
    fn effective_theme_is_a_pure_function(
        initial_os in any::<bool>(),
        ops in proptest::collection::vec(op_strategy(), 0..40),
    ) {
        let storage = MemoryStorage::new();
        let mut resolver = ThemeResolver::new(storage.shared(), initial_os);
        let mut os = initial_os;
        for op in ops {
            match op {
                Op::Set(p) => resolver.set_preference(p),
                Op::Os(dark) => {
                    os = dark;
                    resolver.system_changed(dark);
                }
            }
            prop_assert_eq!(resolver.is_dark(), resolver.preference().is_dark(os));
        }

        let stored = storage.get(PREFERENCE_KEY).unwrap();
        let reloaded = ThemeResolver::new(storage.shared(), os);
        prop_assert_eq!(reloaded.preference(), resolver.preference());
        if stored.is_none() {
            prop_assert_eq!(reloaded.preference(), Preference::System);
        }
    }
}
