//! Protocol tests
//!
//! Organized by feature area. Guests here are written the way a compiled,
//! instrumented program would be: `resume` on entry, `suspend` after every
//! call that may unwind.

mod driver_tests;
mod helpers;
mod programs_tests;
