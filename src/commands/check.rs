use anyhow::{Context, Result};
use colored::Colorize;
use std::time::Instant;

use crate::commands::{load_rust_surface, render_header};
use crate::config;
use crate::ffi_check::compare_surfaces;
use crate::ffi_parser::discover_c_header;

/// Check the header on disk against the Rust exports
pub fn execute(config_path: &str) -> Result<()> {
    let start = Instant::now();

    let config = config::load_config(config_path)?;
    let rust = load_rust_surface(&config)?;

    let header_path = config.header_path();
    if !header_path.exists() {
        anyhow::bail!(
            "Header not found: {}. Run `numbers-abi header` to generate it",
            header_path.display()
        );
    }
    let header = discover_c_header(&header_path)
        .context(format!("Failed to parse header {}", header_path.display()))?;

    let report = compare_surfaces(&rust, &header)?;

    if !report.is_clean() {
        eprintln!(
            "{} {} mismatch(es) between {} and {}:\n",
            "error:".red().bold(),
            report.mismatches.len(),
            config.boundary.source,
            config.boundary.header
        );
        for mismatch in &report.mismatches {
            eprintln!("  {} {}", "-".yellow(), mismatch);
        }
        anyhow::bail!("Check failed with {} mismatch(es)", report.mismatches.len());
    }

    // Structurally sound but hand-edited or out of date text is still worth knowing about
    let generated = render_header(&config, &rust)?;
    let on_disk = std::fs::read_to_string(&header_path)
        .context(format!("Failed to read {}", header_path.display()))?;
    if generated != on_disk {
        println!(
            "{} {} agrees with the exports but differs from generated output",
            "warning:".yellow().bold(),
            config.boundary.header
        );
    }

    let elapsed = start.elapsed();
    println!(
        "   {} {} function(s), {} struct(s) in {:.2}s",
        "Checked".green().bold(),
        report.functions_checked,
        report.structs_checked,
        elapsed.as_secs_f64()
    );

    Ok(())
}
