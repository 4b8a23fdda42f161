use anyhow::Result;
use colored::Colorize;

use crate::commands::load_rust_surface;
use crate::config;
use crate::layout::LayoutTable;

/// Print the computed layout of every #[repr(C)] struct and each exported signature
pub fn execute(config_path: &str) -> Result<()> {
    let config = config::load_config(config_path)?;
    let surface = load_rust_surface(&config)?;
    let layouts = LayoutTable::build(&surface.structs)?;

    if layouts.is_empty() {
        println!("{} No #[repr(C)] structs in {}", "info:".blue().bold(), config.boundary.source);
    }

    for layout in layouts.iter() {
        print!("{}", layout);
        if layout.has_padding() {
            println!(
                "{} `{}` contains padding; its bytes are unspecified on both sides",
                "warning:".yellow().bold(),
                layout.name
            );
        }
        println!();
    }

    for function in &surface.functions {
        println!("  {} {}", "export".cyan(), function.display_c());
    }

    Ok(())
}
