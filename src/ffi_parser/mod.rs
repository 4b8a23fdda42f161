pub mod c;
pub mod rust;

pub use c::{discover_c_header, parse_c_header_from_string};
pub use rust::{discover_rust_exports, parse_rust_exports_from_string};
