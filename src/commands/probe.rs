use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::config;
use crate::probe::{run_conformance, BoundaryFns, LoadedBoundary, ProbeReport};

/// Load each library and run the conformance cases through its exports.
///
/// Libraries given on the command line take precedence over `probe.libraries`.
/// With neither, the built-in implementation is probed.
pub fn execute(config_path: &str, libraries: &[String]) -> Result<()> {
    let config = config::load_config(config_path)?;

    let paths: Vec<PathBuf> = if libraries.is_empty() {
        config.library_paths()
    } else {
        libraries.iter().map(PathBuf::from).collect()
    };

    if paths.is_empty() {
        println!(
            "{} No libraries configured; probing the built-in implementation",
            "info:".blue().bold()
        );
        let report = run_conformance(&BoundaryFns::native());
        print_report("built-in", &report);
        return finish(usize::from(!report.passed()));
    }

    let mut failed = 0;
    for path in &paths {
        // SAFETY: the library is trusted to implement the boundary signatures;
        // that is exactly what the probe is here to exercise.
        let loaded = match unsafe { LoadedBoundary::open(path) } {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("{} {:#}", "error:".red().bold(), e);
                failed += 1;
                continue;
            }
        };

        let report = run_conformance(loaded.fns());
        print_report(&loaded.path().display().to_string(), &report);
        if !report.passed() {
            failed += 1;
        }
    }

    finish(failed)
}

fn print_report(label: &str, report: &ProbeReport) {
    if report.passed() {
        println!(
            "    {} {}: {} case(s) passed",
            "Probed".green().bold(),
            label,
            report.cases_run
        );
    } else {
        eprintln!(
            "{} {}: {} failure(s) in {} case(s)",
            "error:".red().bold(),
            label,
            report.failures.len(),
            report.cases_run
        );
        for failure in &report.failures {
            eprintln!("  {} {}", "-".yellow(), failure);
        }
    }
}

fn finish(failed: usize) -> Result<()> {
    if failed > 0 {
        anyhow::bail!("Probe failed for {} implementation(s)", failed);
    }
    Ok(())
}
