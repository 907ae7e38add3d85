pub mod parser;
pub mod render;
pub mod tokens;
pub mod types;


pub use parser::*;
pub use render::*;
pub use tokens::{Extraction, clean, collapse_whitespace, extract_metadata};
pub use types::*;
