//! Flame graph projection and SVG rendering.
//!
//! The projector turns the span tree into a plain `{name, start, duration,
//! type, children}` shape; the generator draws that shape on a time axis.

pub mod generator;
pub mod projector;

pub use generator::{generate_flamegraph, generate_text_summary, FlamegraphConfig};
pub use projector::{project, FlameNode, FlameType};
