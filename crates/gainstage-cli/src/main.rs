use std::io::BufRead;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gainstage_engine::devices::print_devices;
use gainstage_engine::dsp::{PortKind, UnitSettings};
use gainstage_engine::registry::UnitKind;
use gainstage_engine::render::{render_offline, RenderConfig};
use gainstage_engine::{Engine, EngineConfig};
use gainstage_patch::{parse_assignment, parse_patch, PatchSpec};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "gainstage", version, about = "Gain and tremolo units for real-time audio")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List audio devices
    Devices,
    /// List units and their ports
    Units,
    /// Run a patch over a test tone and print per-block levels
    Render {
        #[command(flatten)]
        patch: PatchArg,
        /// Number of blocks to render
        #[arg(long, default_value_t = 16)]
        blocks: usize,
        #[arg(long, default_value_t = 48_000.0)]
        sample_rate: f32,
        #[arg(long, default_value_t = 512)]
        block_size: usize,
        #[arg(long, default_value_t = 2)]
        channels: usize,
        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        tone: f32,
    },
    /// Run a patch live from input to output. Reads control edits
    /// such as `depth=0.5` or `1.rate=4` from stdin; `q` quits.
    Run {
        #[command(flatten)]
        patch: PatchArg,
        /// Input device name substring
        #[arg(long)]
        input: Option<String>,
        /// Output device name substring
        #[arg(long)]
        output: Option<String>,
        /// Input device index from `devices`
        #[arg(long)]
        input_index: Option<usize>,
        /// Output device index from `devices`
        #[arg(long)]
        output_index: Option<usize>,
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long)]
        block_size: Option<u32>,
    },
}

#[derive(Args)]
struct PatchArg {
    /// Patch text, e.g. "gain gain=0.5 | tremolo rate=4 depth=0.8"
    #[arg(short, long, default_value = "gain")]
    patch: String,
}

impl PatchArg {
    fn parse(&self) -> Result<PatchSpec> {
        parse_patch(&self.patch).with_context(|| format!("invalid patch `{}`", self.patch))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Devices => print_devices()?,
        Command::Units => print_units(),
        Command::Render { patch, blocks, sample_rate, block_size, channels, tone } => {
            let cfg = RenderConfig {
                settings: UnitSettings::new(sample_rate, block_size),
                channels,
                blocks,
                tone_hz: tone,
            };
            let stats = render_offline(&patch.parse()?, &cfg)?;
            println!("block      peak       rms");
            for (i, s) in stats.iter().enumerate() {
                println!("{i:>5}  {:>8.4}  {:>8.4}", s.peak, s.rms);
            }
        }
        Command::Run {
            patch,
            input,
            output,
            input_index,
            output_index,
            sample_rate,
            block_size,
        } => {
            let cfg = EngineConfig {
                input_name: input,
                output_name: output,
                input_index,
                output_index,
                sample_rate,
                block_size,
                patch: patch.parse()?,
            };
            run_live(cfg)?;
        }
    }
    Ok(())
}

fn print_units() {
    for kind in UnitKind::ALL {
        let d = kind.descriptor();
        println!("{kind}  ({} v{}.{}, {})", d.class_name, d.version.0, d.version.1, d.category);
        println!("    {}", d.description);
        let ports = d.inputs.iter().map(|p| ("in ", p)).chain(d.outputs.iter().map(|p| ("out", p)));
        for (dir, port) in ports {
            let default = match (port.kind, port.default) {
                (PortKind::Float, Some(v)) => format!(" = {v}"),
                _ => String::new(),
            };
            println!("    {dir} {:<8} {:<12}{default}  {}", port.key, port.name, port.description);
        }
    }
}

fn run_live(cfg: EngineConfig) -> Result<()> {
    let mut engine = Engine::new(cfg);
    engine.start()?;
    info!("type `key=value` or `stage.key=value` to change a control, `q` to quit");

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        match line {
            "" => continue,
            "q" | "quit" => break,
            _ => {}
        }
        match parse_assignment(line) {
            Ok(a) => match engine.set(&a) {
                Ok(()) => info!("set {line}"),
                Err(e) => warn!("{e}"),
            },
            Err(e) => warn!("{e}"),
        }
    }

    engine.stop();
    Ok(())
}
