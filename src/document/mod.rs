pub mod demo;
pub mod parser;

pub use demo::demo_article;
pub use parser::{detect_kind, parse_bytes, parse_file, split_into_units};
