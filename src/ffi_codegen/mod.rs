pub mod c_header;

pub use c_header::{generate_c_header, guard_from_path, HeaderOptions};
