//! Runtime invariant checking with contract test support.
//!
//! Invariants are asserted on the controller's worker thread, so the log of
//! checked invariants is process-wide rather than thread-local: a test on
//! another thread can then verify that the worker actually checked them.
//!
//! ```rust,ignore
//! use camera_session::invariant::*;
//!
//! assert_invariant!(
//!     exposure >= min && exposure <= max,
//!     "Exposure correction stays within the supported range",
//!     "controller::apply_exposure"
//! );
//!
//! #[test]
//! fn contract_exposure() {
//!     contract_test("exposure", &["Exposure correction stays within the supported range"]);
//! }
//! ```

use lazy_static::lazy_static;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
}

/// Assert an invariant and log it for contract testing.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(message.to_string());

    if !condition {
        let ctx = context.unwrap_or("unknown");
        log::error!("invariant violation [{}]: {}", ctx, message);
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Check that specific invariants were verified at least once.
///
/// # Panics
/// Panics if any required invariant was not checked.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.lock().unwrap_or_else(PoisonError::into_inner);

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Whether `message` has been checked so far.
pub fn was_checked(message: &str) -> bool {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(message)
}
