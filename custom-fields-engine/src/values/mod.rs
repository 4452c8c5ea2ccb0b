//! Typed value extraction and change detection.

mod diff;
mod extract;

pub use diff::{compute_diff, field_changed, has_changes, SlugMap, ValueMap};
pub use extract::{accepts, coerce_edit, empty_value, extract_value, resolver_for, Resolver};
