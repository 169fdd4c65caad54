use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dcpu16_rs::decoder::Register;
use dcpu16_rs::devices::{Clock, Console};
use dcpu16_rs::exec::IntExecutor;
use dcpu16_rs::isa::dcpu17::Dcpu17Decoder;
use dcpu16_rs::{assemble, Cpu, CpuConfig, Line};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a DCPU-16 program on the dcpu16-rs interpreter")]
struct Opts {
    /// Treat the input as assembly source instead of a binary image
    #[arg(long)]
    asm: bool,
    /// CPU configuration as JSON (queue_depth, little_endian)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Read the image as little-endian words
    #[arg(long)]
    little_endian: bool,
    /// Stop after this many steps
    #[arg(long, default_value_t = 10_000_000u64)]
    limit: u64,
    /// Peripheral line (0-15) for the console
    #[arg(long, value_name = "LINE")]
    console: Option<u8>,
    /// Feed stdin to the console
    #[arg(long, requires = "console")]
    stdin: bool,
    /// Peripheral line (0-15) for the clock
    #[arg(long, value_name = "LINE")]
    clock: Option<u8>,
    /// Print registers when the machine stops
    #[arg(long)]
    dump: bool,
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn line(index: u8) -> Result<Line> {
    Line::new(index).with_context(|| format!("peripheral line {index} is out of range (0-15)"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let mut cfg = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<CpuConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => CpuConfig::default(),
    };
    cfg.little_endian |= opts.little_endian;

    let mut cpu = Cpu::new(cfg);
    if opts.asm {
        let src = std::fs::read_to_string(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?;
        let out = assemble(&src)?;
        cpu.load(&out.words);
    } else {
        let bytes = std::fs::read(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?;
        cpu.load_bytes(&bytes);
    }

    if let Some(idx) = opts.console {
        let mut console = Console::new(std::io::stdout());
        if opts.stdin {
            console = console.with_input(std::io::stdin());
        }
        cpu.attach(Box::new(console), Some(line(idx)?))?;
    }
    if let Some(idx) = opts.clock {
        cpu.attach(Box::new(Clock::new()), Some(line(idx)?))?;
    }

    let dec = Dcpu17Decoder::new();
    let summary = cpu.run(&dec, &IntExecutor, Some(opts.limit));
    match summary.halt {
        Some(reason) => eprintln!("halted after {} steps: {reason}", summary.steps),
        None => eprintln!("stopped after {} steps (limit)", summary.steps),
    }

    if opts.dump {
        for r in Register::ALL {
            eprint!("{}={:04x} ", r.name(), cpu.reg(r));
        }
        eprintln!(
            "PC={:04x} SP={:04x} EX={:04x} IA={:04x} cycles={}",
            cpu.pc(),
            cpu.sp(),
            cpu.ex(),
            cpu.ia(),
            cpu.cycles()
        );
    }
    Ok(())
}
