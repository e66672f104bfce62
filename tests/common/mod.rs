#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;

use proptest::prelude::*;

pub use bob_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// `task -> deps` declarations from a compact literal.
pub fn decls(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(name, deps)| {
            (
                name.to_string(),
                deps.iter().map(|d| d.to_string()).collect(),
            )
        })
        .collect()
}

/// The graph used throughout the rebuild tests:
/// 4 -> 3, 5 -> 3, 3 -> 2, 6 -> 2 (dependency -> dependent).
pub fn hello_world_decls() -> BTreeMap<String, Vec<String>> {
    decls(&[
        ("hello_world_2", &["hello_world_3", "hello_world_6"]),
        ("hello_world_3", &["hello_world_4", "hello_world_5"]),
        ("hello_world_4", &[]),
        ("hello_world_5", &[]),
        ("hello_world_6", &[]),
    ])
}

// Acyclic by construction: task N may only depend on tasks 0..N-1.
pub fn acyclic_decls(max_tasks: usize) -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    (1..=max_tasks).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: BTreeSet<String> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| format!("t{}", p % i)).collect()
                        };
                        (format!("t{i}"), deps.into_iter().collect::<Vec<String>>())
                    })
                    .collect::<BTreeMap<String, Vec<String>>>()
            },
        )
    })
}
