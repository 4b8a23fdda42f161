pub mod header;
pub mod check;
pub mod layout;
pub mod probe;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::ffi_codegen::{generate_c_header, HeaderOptions};
use crate::ffi_parser::discover_rust_exports;
use crate::layout::LayoutTable;
use crate::surface::Surface;

/// Discover the Rust exports named by the config
pub fn load_rust_surface(config: &Config) -> Result<Surface> {
    let source = config.source_path();
    discover_rust_exports(&source)
        .context(format!("Failed to read boundary source {}", source.display()))
}

/// Render the header text the config's Rust source implies
pub fn render_header(config: &Config, surface: &Surface) -> Result<String> {
    let layouts = LayoutTable::build(&surface.structs)?;
    let options = HeaderOptions {
        guard: config.guard(),
        source_label: config.boundary.source.clone(),
    };
    generate_c_header(surface, &layouts, &options)
}
