//! Property-based tests for the tasks peer.

use proptest::prelude::*;
use quickstart_tasks::{PeerConfig, TasksPeer};
use std::collections::HashSet;

fn peer() -> TasksPeer {
    TasksPeer::new(PeerConfig::new("property-tests", "token")).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_added_ids_are_unique(titles in prop::collection::vec(".{0,20}", 1..40)) {
        let peer = peer();
        let ids: Vec<String> = titles
            .iter()
            .map(|title| peer.add_task(title, false).unwrap())
            .collect();

        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert_eq!(peer.get_tasks(false).unwrap().len(), titles.len());
    }

    #[test]
    fn prop_title_round_trip(title in ".{0,64}", done in any::<bool>()) {
        let peer = peer();
        let id = peer.add_task(&title, done).unwrap();
        let task = peer.get_task(&id).unwrap();
        prop_assert_eq!(task.title, title);
        prop_assert_eq!(task.done, done);
        prop_assert!(!task.deleted);
    }

    #[test]
    fn prop_delete_then_evict(done_flags in prop::collection::vec(any::<bool>(), 1..20)) {
        let peer = peer();
        let ids: Vec<String> = done_flags
            .iter()
            .map(|done| peer.add_task("t", *done).unwrap())
            .collect();

        let mut deleted = 0;
        for (id, done) in ids.iter().zip(&done_flags) {
            if *done {
                peer.delete_task(id).unwrap();
                deleted += 1;
            }
        }

        prop_assert_eq!(peer.get_tasks(false).unwrap().len(), ids.len() - deleted);
        prop_assert_eq!(peer.evict_deleted_tasks().unwrap(), deleted);
        prop_assert_eq!(peer.get_tasks(true).unwrap().len(), ids.len() - deleted);
    }
}
