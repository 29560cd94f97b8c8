//! Cross-cutting utilities.

pub mod logging;
