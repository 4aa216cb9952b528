//! Macro conversion
//!
//! Rewrites source macros into their target-native equivalents. The
//! [`MacroConverterRegistry`] dispatches each occurrence to the
//! [`MacroConverter`] registered for its identifier; unknown macros pass
//! through unchanged.

pub mod converter;
pub mod converters;
pub mod registry;
pub mod types;

pub use converter::MacroConverter;
pub use registry::MacroConverterRegistry;
pub use types::*;
