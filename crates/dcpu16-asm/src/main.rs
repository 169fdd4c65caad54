use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dcpu16_asm::{load_image, render, words_to_bytes, ByteOrder, ListingOptions};
use dcpu16_rs::asm::srcmap::MapExport;
use dcpu16_rs::assemble;

#[derive(Parser, Debug)]
#[command(author, version, about = "DCPU-16 assembler and disassembler", long_about = None)]
struct Cli {
    /// Images are little-endian instead of big-endian
    #[arg(long, global = true)]
    little_endian: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into a raw word image
    Asm {
        #[arg(value_name = "SOURCE")]
        input: PathBuf,
        /// Output image path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Write labels, line numbers and code ranges as JSON
        #[arg(long, value_name = "FILE")]
        map: Option<PathBuf>,
    },
    /// List the instructions in a raw word image
    Disasm {
        #[arg(value_name = "IMAGE")]
        input: PathBuf,
        /// First word address (hex or dec)
        #[arg(long, default_value = "0")]
        start: String,
        /// End word address, exclusive (hex or dec)
        #[arg(long)]
        end: Option<String>,
        /// Show the raw words of each instruction
        #[arg(long)]
        show_words: bool,
        /// Source map from `asm --map`, for labels and data ranges
        #[arg(long, value_name = "FILE")]
        map: Option<PathBuf>,
        /// Write the listing to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn parse_u16(s: &str) -> Result<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u16::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u16>()?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let order = ByteOrder::little(cli.little_endian);

    match cli.cmd {
        Command::Asm { input, output, map } => {
            let src = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let out = assemble(&src).with_context(|| format!("assembling {}", input.display()))?;
            std::fs::write(&output, words_to_bytes(&out.words, order))?;
            if let Some(path) = map {
                let json = serde_json::to_string_pretty(&out.map.export())?;
                std::fs::write(path, json)?;
            }
            tracing::info!(words = out.words.len(), labels = out.symbols.len(), "wrote {}", output.display());
        }
        Command::Disasm { input, start, end, show_words, map, out } => {
            let words = load_image(&input, order)?;
            let map: Option<MapExport> = match map {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)?;
                    Some(serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?)
                }
                None => None,
            };
            let opts = ListingOptions {
                start: parse_u16(&start)?,
                end: end.as_deref().map(parse_u16).transpose()?,
                show_words,
            };
            if let Some(e) = opts.end {
                anyhow::ensure!(e >= opts.start, "end must be >= start");
            }
            let text = render(&words, map.as_ref(), &opts);
            match out {
                Some(path) => std::fs::write(path, text)?,
                None => print!("{text}"),
            }
        }
    }
    Ok(())
}
