use std::path::PathBuf;

use aobhook::Diagnostic;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "aobhook")]
#[command(about = "Inspect PE images and test byte signatures against them")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sections of an image
    Sections {
        /// PE file to load
        image: PathBuf,
    },

    /// Find a pattern and print its address
    Scan {
        /// PE file to load
        image: PathBuf,
        /// Pattern, e.g. "48 8D 0D ?? ?? ?? ??"
        pattern: String,
        /// Section to search
        #[arg(short, long)]
        section: Option<String>,
        /// Signed offset added to the match (hex with 0x, or decimal)
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        offset: String,
        /// Print every match instead of the first
        #[arg(long)]
        all: bool,
    },

    /// Resolve the target of a RIP-relative instruction at a pattern match
    Base {
        /// PE file to load
        image: PathBuf,
        /// Pattern matching the start of the instruction
        pattern: String,
        /// Offset of the 32-bit displacement within the instruction
        #[arg(long, default_value_t = 3)]
        opcode_offset: usize,
        /// Length of the instruction
        #[arg(long, default_value_t = 7)]
        instruction_offset: usize,
        /// Section to search
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Resolve every entry of a signature file
    Check {
        /// PE file to load
        image: PathBuf,
        /// Signature set (JSON)
        signatures: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let directive = if args.verbose { "aobhook=debug" } else { "aobhook=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args.command) {
        match e.downcast_ref::<Diagnostic>() {
            Some(diagnostic) => eprintln!("{}", diagnostic.render()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Sections { image } => commands::sections::run(&image),
        Command::Scan {
            image,
            pattern,
            section,
            offset,
            all,
        } => commands::scan::run(&image, &pattern, section.as_deref(), &offset, all),
        Command::Base {
            image,
            pattern,
            opcode_offset,
            instruction_offset,
            section,
        } => commands::base::run(
            &image,
            &pattern,
            opcode_offset,
            instruction_offset,
            section.as_deref(),
        ),
        Command::Check { image, signatures } => commands::check::run(&image, &signatures),
    }
}
