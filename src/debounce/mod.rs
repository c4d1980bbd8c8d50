//! Debounce Module
//!
//! Delays propagation of a changing value or a repeatedly invoked callback
//! until the input has been quiet for a configured delay. Both shapes are
//! thin wrappers over one cancellable single-slot timer.

mod function;
mod timer;
mod value;


pub use function::{DebounceMode, Debounced};
pub use timer::DebounceTimer;
pub use value::DebouncedValue;
