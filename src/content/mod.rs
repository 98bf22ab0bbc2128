//! Prompt construction, output normalization and fallback content.

pub mod extract;
pub mod fallback;
pub mod normalize;
pub mod prompt;

pub use extract::extract_json_object;
pub use fallback::fallback_content;
pub use normalize::{normalize, placeholder_image};
pub use prompt::{build_turns, generation_options};
