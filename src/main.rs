use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::info;

use ymopm::ym2151::OUTPUTS;
use ymopm::{ClockedHost, EngineConfig, OutputFrame, Ym2151};

mod script;
mod wav;

use script::Command;

/// NTSC colour burst crystal most YM2151 boards run from
const DEFAULT_CLOCK: u32 = 3_579_545;

/// Register offsets of operator slots 1-4 relative to the channel
const OPERATOR_SLOTS: [u8; 4] = [0, 16, 8, 24];

/// Render YM2151 register writes to WAV files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct ChipArgs {
    /// Input clock in Hz
    #[arg(long, default_value_t = DEFAULT_CLOCK)]
    clock: u32,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output WAV file
    #[arg(short, long, default_value = "out.wav")]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a single programmed note on one channel
    Tone {
        #[command(flatten)]
        chip: ChipArgs,

        /// Channel (0-7)
        #[arg(long, default_value_t = 0)]
        channel: u8,

        /// Connection algorithm (0-7)
        #[arg(long, default_value_t = 7)]
        algorithm: u8,

        /// Operator 1 feedback (0-7)
        #[arg(long, default_value_t = 0)]
        feedback: u8,

        /// Key code: octave in bits 4-6, note in bits 0-3
        #[arg(long, default_value = "4a", value_parser = parse_hex_byte)]
        key_code: u8,

        /// Key fraction (0-63)
        #[arg(long, default_value_t = 0)]
        key_fraction: u8,

        /// Total level per operator slot (0-127)
        #[arg(long, value_delimiter = ',', default_value = "0,127,127,127")]
        total_level: Vec<u8>,

        /// Frequency multiple for every operator (0-15)
        #[arg(long, default_value_t = 1)]
        multiple: u8,

        /// Attack rate (0-31)
        #[arg(long, default_value_t = 31)]
        attack_rate: u8,

        /// Decay rate (0-31)
        #[arg(long, default_value_t = 0)]
        decay_rate: u8,

        /// Sustain rate (0-31)
        #[arg(long, default_value_t = 0)]
        sustain_rate: u8,

        /// Sustain level (0-15)
        #[arg(long, default_value_t = 0)]
        sustain_level: u8,

        /// Release rate (0-15)
        #[arg(long, default_value_t = 7)]
        release_rate: u8,

        /// Key on time in milliseconds
        #[arg(long, default_value_t = 1000)]
        duration_ms: u32,

        /// Time rendered after key off in milliseconds
        #[arg(long, default_value_t = 500)]
        release_ms: u32,
    },
    /// Play a register script (`w AA DD`, `s N`, `#` comments)
    Regs {
        #[command(flatten)]
        chip: ChipArgs,

        /// Script file
        script: PathBuf,
    },
}

fn parse_hex_byte(s: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
}

/// A chip plus the frames it has rendered so far
struct Session {
    chip: Ym2151<ClockedHost>,
    frames: Vec<OutputFrame<OUTPUTS>>,
    sample_rate: u32,
}

impl Session {
    fn new(args: &ChipArgs) -> Result<Self> {
        let config = load_config(args.config.as_deref())?;
        let chip = Ym2151::new(ClockedHost::new(), config);
        let sample_rate = chip.sample_rate(args.clock);
        if sample_rate == 0 {
            bail!("clock {} Hz is too slow", args.clock);
        }
        Ok(Self {
            chip,
            frames: vec![],
            sample_rate,
        })
    }

    fn write(&mut self, register: u8, data: u8) -> Result<()> {
        self.chip
            .write_register(register, data)
            .with_context(|| format!("writing {:02X} = {:02X}", register, data))
    }

    fn run(&mut self, samples: usize) -> Result<()> {
        let start = self.frames.len();
        self.frames.resize(start + samples, OutputFrame::default());
        self.chip.generate_clocked(&mut self.frames[start..])?;
        Ok(())
    }

    fn milliseconds(&self, ms: u32) -> usize {
        (u64::from(ms) * u64::from(self.sample_rate) / 1000) as usize
    }

    fn finish(self, output: &Path) -> Result<()> {
        let wav = wav::encode_wav(&self.frames, self.sample_rate)?;
        std::fs::write(output, wav).with_context(|| format!("writing '{}'", output.display()))?;
        info!(
            "wrote {} samples at {} Hz to {}",
            self.frames.len(),
            self.sample_rate,
            output.display()
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Tone {
            chip,
            channel,
            algorithm,
            feedback,
            key_code,
            key_fraction,
            total_level,
            multiple,
            attack_rate,
            decay_rate,
            sustain_rate,
            sustain_level,
            release_rate,
            duration_ms,
            release_ms,
        } => {
            if channel > 7 {
                bail!("channel must be 0-7 (got {})", channel);
            }
            if total_level.len() != OPERATOR_SLOTS.len() {
                bail!("expected 4 total levels (got {})", total_level.len());
            }

            let mut session = Session::new(&chip)?;

            session.write(0x20 + channel, 0xc0 | ((feedback & 7) << 3) | (algorithm & 7))?;
            session.write(0x28 + channel, key_code)?;
            session.write(0x30 + channel, (key_fraction & 0x3f) << 2)?;

            for (slot, level) in OPERATOR_SLOTS.iter().zip(&total_level) {
                let opoffs = channel + slot;
                session.write(0x40 + opoffs, multiple & 0x0f)?;
                session.write(0x60 + opoffs, level & 0x7f)?;
                session.write(0x80 + opoffs, attack_rate & 0x1f)?;
                session.write(0xa0 + opoffs, decay_rate & 0x1f)?;
                session.write(0xc0 + opoffs, sustain_rate & 0x1f)?;
                session.write(0xe0 + opoffs, ((sustain_level & 0x0f) << 4) | (release_rate & 0x0f))?;
            }

            session.write(0x08, 0x78 | channel)?;
            let samples = session.milliseconds(duration_ms);
            session.run(samples)?;

            session.write(0x08, channel)?;
            let samples = session.milliseconds(release_ms);
            session.run(samples)?;

            session.finish(&chip.output)?;
        }
        Commands::Regs { chip, script: path } => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading '{}'", path.display()))?;
            let commands = script::parse_script(&text).with_context(|| format!("parsing '{}'", path.display()))?;

            let mut session = Session::new(&chip)?;
            for command in commands {
                match command {
                    Command::Write { register, data } => session.write(register, data)?,
                    Command::Wait(samples) => session.run(samples)?,
                }
            }

            session.finish(&chip.output)?;
        }
    }

    Ok(())
}
