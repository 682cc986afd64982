//! The example program run by the emulator, written natively.
//!
//! [`evaluate`] computes the n-th term of 1, 1, 2, 3, 5, 8, ... with a
//! rolling accumulator: only the two most recent terms are kept, so the
//! computation is O(n) in time and O(1) in space.
//!
//! The term type is `i32`, the width of a C `int`. [`evaluate`] wraps on
//! overflow, [`checked_evaluate`] reports it.

use tracing::trace;

/// Index fed to [`evaluate`] by the `fibonacci` harness binary.
pub const FIXED_INDEX: i32 = 7;

/// Value the harness is expected to exit with for [`FIXED_INDEX`].
pub const FIXED_INDEX_TERM: i32 = 13;

/// Errors reported by [`checked_evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("Term {index} does not fit in i32 (overflowed at step {step})")]
    Overflow { index: i32, step: i32 },
}

/// Computes the `n`-th term of the sequence.
///
/// The seeds are `0` (the term before the first) and `1` (the first term).
/// The loop runs for `i` in `1..n`, so any `n <= 1` returns the seed `1`,
/// including zero and negative indices.
///
/// Overflow is not detected: from `n = 47` on the sum wraps around in two's
/// complement and the result is meaningless. Use [`checked_evaluate`] when
/// that matters.
pub fn evaluate(n: i32) -> i32 {
    let mut previous = 0i32;
    let mut current = 1i32;

    for _ in 1..n {
        let before = previous;
        previous = current;
        current = before.wrapping_add(previous);
    }

    current
}

/// Same as [`evaluate`], but fails on the first step whose sum overflows.
///
/// ## Errors
///
/// Returns [`SequenceError::Overflow`] with the requested index and the step
/// at which the accumulator left the `i32` range.
pub fn checked_evaluate(n: i32) -> Result<i32, SequenceError> {
    let mut previous = 0i32;
    let mut current = 1i32;

    for step in 1..n {
        let next = previous
            .checked_add(current)
            .ok_or(SequenceError::Overflow { index: n, step })?;
        previous = current;
        current = next;
        trace!(step, current, "advanced accumulator");
    }

    Ok(current)
}
