use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use mpegts_zapper::calendar::mjd_to_date;
use mpegts_zapper::config::AcquisitionConfig;
use mpegts_zapper::psi::sections;
use mpegts_zapper::report::Reporter;
use mpegts_zapper::si_cache::Table;
use mpegts_zapper::types::TableKind;

#[derive(Parser)]
#[command(version, about = "PAT/PMT/TDT/TOT section decoder")]
struct Opt {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a file of back-to-back sections, one JSON document per section
    Decode {
        file: PathBuf,

        /// The file holds hex text instead of raw bytes
        #[arg(long, default_value_t = false)]
        hex: bool,
    },
    /// Print the calendar date of a Modified Julian Date (decimal or 0x-hex)
    Mjd { value: String },
    /// Validate a TOML acquisition config and print it as JSON
    Config { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if opt.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match opt.command {
        Command::Decode { file, hex } => decode(&file, hex),
        Command::Mjd { value } => {
            let mjd = parse_u16(&value)?;
            let date = mjd_to_date(mjd);
            println!("{:04}-{:02}-{:02}", date.year, date.month, date.day);
            Ok(())
        }
        Command::Config { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let config = AcquisitionConfig::from_toml_str(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn decode(file: &Path, hex: bool) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let data = if hex { parse_hex(&raw)? } else { raw };

    let mut decoded = 0usize;
    for (n, section) in sections(&data).enumerate() {
        let Some(kind) = TableKind::from_table_id(section[0]) else {
            debug!(section = n, table_id = section[0], "skipping table");
            continue;
        };
        match Table::parse(kind, section) {
            Ok(table) => {
                println!("{}", serde_json::to_string_pretty(&Reporter::table(&table)?)?);
                decoded += 1;
            }
            Err(e) => warn!(section = n, %kind, error = %e, "cannot decode"),
        }
    }
    if decoded == 0 {
        bail!("no PAT/PMT/TDT/TOT section found in {}", file.display());
    }
    Ok(())
}

fn parse_hex(text: &[u8]) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = text.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    hex::decode(digits).context("invalid hex input")
}

fn parse_u16(value: &str) -> anyhow::Result<u16> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.with_context(|| format!("invalid MJD {value:?}"))
}
