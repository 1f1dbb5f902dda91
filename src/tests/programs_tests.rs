//! Tests for the bundled guest programs

use super::helpers::{argv, test_runtime};
use crate::driver::start;
use crate::programs::{self, PROGRAMS};
use std::collections::HashSet;

fn run(name: &str, rest: &[&str]) -> (i32, crate::runtime::RuntimeStats) {
    let program = programs::find(name).unwrap();
    let mut rt = test_runtime();
    let code = start(&mut rt, program.entry, &argv(rest));
    (code, rt.stats())
}

#[test]
fn test_registry_names_are_unique_and_findable() {
    let names: HashSet<_> = PROGRAMS.iter().map(|p| p.name).collect();
    assert_eq!(names.len(), PROGRAMS.len());
    for program in PROGRAMS {
        assert_eq!(programs::find(program.name).unwrap().name, program.name);
    }
    assert!(programs::find("missing").is_none());
}

#[test]
fn test_countdown_reuses_one_buffer() {
    let (code, stats) = run("countdown", &["5"]);

    assert_eq!(code, 5);
    assert_eq!(stats.captures, 1);
    assert_eq!(stats.jumps, 5);
    assert_eq!(stats.deliveries, 5);
    // capture round trip, then one pass per jump
    assert_eq!(stats.root_passes, 7);
}

#[test]
fn test_countdown_defaults_to_three() {
    assert_eq!(run("countdown", &[]).0, 3);
}

#[test]
fn test_countdown_with_zero_limit_never_jumps() {
    let (code, stats) = run("countdown", &["0"]);
    assert_eq!(code, 0);
    assert_eq!(stats.jumps, 0);
}

#[test]
fn test_exceptions_catches_every_reraise() {
    let (code, stats) = run("exceptions", &[]);

    // caught 3, 2, 1
    assert_eq!(code, 6);
    assert_eq!(stats.jumps, 3);
    assert_eq!(stats.intercepts, 3);
    assert_eq!(stats.deliveries, 0);
    assert_eq!(stats.root_passes, 1);
}

#[test]
fn test_exceptions_with_depth() {
    assert_eq!(run("exceptions", &["4"]).0, 10);
    assert_eq!(run("exceptions", &["1"]).0, 1);
    // depth is clamped to 1
    assert_eq!(run("exceptions", &["-2"]).0, 1);
}

#[test]
fn test_nested_returns_payload() {
    assert_eq!(run("nested", &[]).0, 5);
    assert_eq!(run("nested", &["9"]).0, 9);
    // a zero payload falls back to the default
    assert_eq!(run("nested", &["0"]).0, 5);
}
