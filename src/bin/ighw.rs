//! IGHW command line tool
//!
//! Extracts containers into editable workspaces and packs them back.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ighw_rs::{Codec, CodecConfig, Container, Report, Version};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ighw")]
#[command(about = "Extract, edit and repack IGHW level containers")]
struct Args {
    /// Codec configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail when any warning was collected
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a container into a workspace folder
    Extract {
        input: PathBuf,
        /// Defaults to the input file name without extension
        outdir: Option<PathBuf>,
    },

    /// Encode a workspace folder into a container
    Repack {
        dir: PathBuf,
        /// Defaults to `<dir>.dat`
        output: Option<PathBuf>,
    },

    /// Write a container with no sections
    Mkheader {
        output: PathBuf,
        #[arg(long, default_value_t = Version::EMPTY.major)]
        major: u16,
        #[arg(long, default_value_t = Version::EMPTY.minor)]
        minor: u16,
    },

    /// Print the header, section table and pointer count
    Info { input: PathBuf },
}

fn load_config(args: &Args) -> Result<CodecConfig> {
    let config = match &args.config {
        Some(path) => CodecConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CodecConfig::default(),
    };
    Ok(if args.strict { config.strict(true) } else { config })
}

/// Print the warnings and apply strict mode
fn finish(report: &Report, config: &CodecConfig) -> Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    eprintln!("{} warning(s):", report.len());
    for warning in report.warnings() {
        eprintln!("  {}", warning);
    }
    if config.strict {
        bail!("strict mode: {} warning(s) collected", report.len());
    }
    Ok(())
}

fn default_outdir(input: &Path) -> PathBuf {
    input.with_extension("")
}

fn default_output(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repacked".to_string());
    dir.with_file_name(format!("{}.dat", name))
}

fn print_info(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let container = Container::parse(&bytes).with_context(|| format!("{} is not a valid IGHW container", input.display()))?;
    let header = &container.header;
    println!("{}: IGHW {} ({} bytes)", input.display(), header.version, bytes.len());
    println!("  sections:      {}", header.section_count);
    println!("  header length: {:#x}", header.header_length);
    println!(
        "  pointer table: {:#x} ({} pointers)",
        header.pointer_table_offset, header.pointer_count
    );
    println!("  {:>10} {:>10} {:>6} {:>8} {:>10}", "id", "offset", "flag", "count", "size");
    for entry in container.sections.entries() {
        println!(
            "  {:#010x} {:#010x} {:#06x} {:>8} {:>10}",
            entry.id,
            entry.offset,
            entry.flag.to_u8(),
            entry.item_count(),
            entry.length()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let codec = Codec::with_config(config.clone());

    match args.command {
        Command::Extract { input, outdir } => {
            let outdir = outdir.unwrap_or_else(|| default_outdir(&input));
            info!("Extracting {} into {}", input.display(), outdir.display());
            let (manifest, report) = codec
                .extract(&input, &outdir)
                .with_context(|| format!("failed to extract {}", input.display()))?;
            info!(
                "Extracted {} records in {} zones",
                manifest.record_count(),
                manifest.zones.len()
            );
            finish(&report, &config)
        }
        Command::Repack { dir, output } => {
            let output = output.unwrap_or_else(|| default_output(&dir));
            info!("Repacking {} into {}", dir.display(), output.display());
            let report = codec
                .repack(&dir, &output)
                .with_context(|| format!("failed to repack {}", dir.display()))?;
            finish(&report, &config)
        }
        Command::Mkheader {
            output,
            major,
            minor,
        } => ighw_rs::mkheader(&output, Version::new(major, minor))
            .with_context(|| format!("failed to write {}", output.display())),
        Command::Info { input } => print_info(&input),
    }
}
