//! Stack growth for the recursive passes.
//!
//! The parser, resolver, and interpreter all recurse once per level of
//! syntactic nesting, and the interpreter once more per user-level call.
//! Wrapping those entry points in [`ensure_sufficient_stack`] moves deep
//! recursion onto heap-allocated stack segments instead of overflowing the
//! thread's native stack.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
