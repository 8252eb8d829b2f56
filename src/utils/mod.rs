// Utils

pub mod logging;
pub mod text;

pub use text::{is_blank, span_text};
