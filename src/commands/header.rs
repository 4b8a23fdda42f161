use anyhow::{Context, Result};
use colored::Colorize;
use similar::TextDiff;
use std::fs;

use crate::commands::{load_rust_surface, render_header};
use crate::config;

/// Generate the C header, or with `check_only` verify the file on disk is current
pub fn execute(config_path: &str, check_only: bool) -> Result<()> {
    let config = config::load_config(config_path)?;
    let surface = load_rust_surface(&config)?;

    if surface.functions.is_empty() {
        println!(
            "{} No exported functions found in {}",
            "warning:".yellow().bold(),
            config.boundary.source
        );
    }

    let generated = render_header(&config, &surface)?;
    let header_path = config.header_path();

    let existing = if header_path.exists() {
        Some(fs::read_to_string(&header_path)
            .context(format!("Failed to read {}", header_path.display()))?)
    } else {
        None
    };

    if check_only {
        let current = existing.unwrap_or_default();
        if current == generated {
            println!("   {} {} is up to date", "Checked".green().bold(), config.boundary.header);
            return Ok(());
        }

        let diff = TextDiff::from_lines(&current, &generated);
        eprint!(
            "{}",
            diff.unified_diff()
                .context_radius(3)
                .header(&config.boundary.header, "generated")
        );
        anyhow::bail!(
            "{} is stale; run `numbers-abi header` to regenerate it",
            config.boundary.header
        );
    }

    if existing.as_deref() == Some(generated.as_str()) {
        println!("     {} {}", "Fresh".green().bold(), config.boundary.header);
        return Ok(());
    }

    if let Some(parent) = header_path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&header_path, &generated)
        .context(format!("Failed to write header: {}", header_path.display()))?;

    println!(
        " {} {} ({} function(s), {} struct(s))",
        "Generated".green().bold(),
        config.boundary.header,
        surface.functions.len(),
        surface.structs.len()
    );

    Ok(())
}
