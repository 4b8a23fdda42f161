use clap::{Parser, Subcommand};
use colored::Colorize;
use numbers_abi::commands;
use numbers_abi::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "numbers-abi")]
#[command(about = "Keep the C ABI of the numbers boundary in sync across languages", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to numbers-abi.toml
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the C header from the Rust exports
    Header {
        /// Fail if the header on disk differs from generated output instead of writing it
        #[arg(long)]
        check: bool,
    },
    /// Check the header on disk against the Rust exports (symbols and struct layouts)
    Check,
    /// Print computed struct layouts and exported signatures
    Layout,
    /// Load shared libraries and run the conformance cases through their exports
    Probe {
        /// Libraries to probe (defaults to `probe.libraries` in the config)
        libraries: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Header { check } => {
            commands::header::execute(&cli.config, check)
        }
        Commands::Check => {
            commands::check::execute(&cli.config)
        }
        Commands::Layout => {
            commands::layout::execute(&cli.config)
        }
        Commands::Probe { libraries } => {
            commands::probe::execute(&cli.config, &libraries)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
