//! Test helpers for protocol tests
//!
//! Runtimes that panic on contract violations, plus a per-thread event log
//! guests write to (entry points are plain `fn` pointers and cannot capture).

use crate::config::{Config, FatalPolicy};
use crate::runtime::Runtime;
use std::cell::RefCell;

thread_local! {
    static EVENTS: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// Runtime with default buffer size, panicking on contract violations,
/// unaffected by `ASYNCJMP_*` variables in the test environment
pub fn test_runtime() -> Runtime {
    test_runtime_with_size(crate::stack_buffer::DEFAULT_STACK_BUFFER_SIZE)
}

pub fn test_runtime_with_size(stack_buffer_size: usize) -> Runtime {
    let config = Config::builder()
        .without_env()
        .on_fatal(FatalPolicy::Panic)
        .stack_buffer_size(stack_buffer_size)
        .build()
        .expect("test config must be valid");
    Runtime::new(config)
}

/// `argv` for a guest: the program name followed by `rest`
pub fn argv(rest: &[&str]) -> Vec<String> {
    std::iter::once("guest")
        .chain(rest.iter().copied())
        .map(String::from)
        .collect()
}

pub fn record(event: impl Into<String>) {
    EVENTS.with(|events| events.borrow_mut().push(event.into()));
}

/// Drain the event log of the current thread
pub fn take_events() -> Vec<String> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}
