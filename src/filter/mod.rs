//! Span visibility filters and their debounced controller

pub mod debounce;
pub mod visibility;

pub use debounce::{Debouncer, FilterController, ScheduledTask, Ticket};
pub use visibility::{apply_filter, set_expanded, SearchPattern, SpanFilter, TypeFilter};
