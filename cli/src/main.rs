use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use rttywave_core::wav::write_wav;
use rttywave_core::{
    ita2, AudioBackend, BaudotEncoder, DirectoryStore, EventSink, FskSynthesizer, LogEvent,
    LogKind, TransmitConfig, Transmitter, POLL_INTERVAL_MS,
};
use std::fs::File;
use std::future::Future;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Parser)]
#[command(name = "rttywave")]
#[command(about = "Send text as an RTTY (Baudot FSK) audio transmission")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn load_config(path: &Path) -> Result<TransmitConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Line settings shared by the commands that synthesize audio
#[derive(Args)]
struct ToneArgs {
    /// JSON settings file; flags given here override its values
    #[arg(long, value_name = "FILE.JSON")]
    config: Option<PathBuf>,

    /// Baud rate (default: 45.45)
    #[arg(short, long)]
    baud: Option<f64>,

    /// Mark tone in Hz (default: 1170)
    #[arg(long, value_name = "HZ")]
    mark: Option<u32>,

    /// Space tone in Hz (default: 1000)
    #[arg(long, value_name = "HZ")]
    space: Option<u32>,

    /// Volume in percent (default: 50)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,

    /// Log every symbol and the full bit listing
    #[arg(short, long)]
    verbose: bool,
}

impl ToneArgs {
    fn resolve(&self) -> Result<TransmitConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => TransmitConfig::default(),
        };

        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(mark) = self.mark {
            config.mark_freq = mark;
        }
        if let Some(space) = self.space {
            config.space_freq = space;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
        if self.verbose {
            config.verbose = true;
        }

        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play text as RTTY on the audio output
    Transmit {
        /// Text to send
        text: String,

        #[command(flatten)]
        tone: ToneArgs,

        /// Save the signal as RTTY.wav once playback finishes
        #[arg(long)]
        save: bool,

        /// Directory the saved file goes to
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Output device name (default: system default)
        #[arg(long)]
        device: Option<String>,
    },

    /// Render text as an RTTY WAV file without playing it
    Encode {
        /// Text to send
        text: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        #[command(flatten)]
        tone: ToneArgs,
    },

    /// Show the Baudot symbols and bit units for text
    Bits {
        /// Text to encode
        text: String,
    },
}

/// Prints events to the terminal with a UTC timestamp
struct TerminalSink;

impl EventSink for TerminalSink {
    fn report(&self, event: LogEvent) {
        let stamp = humantime::format_rfc3339_seconds(SystemTime::now()).to_string();
        let time = stamp.get(11..19).unwrap_or(&stamp);
        match event.kind {
            LogKind::Info => println!("[{}] {}", time, event.message),
            LogKind::Highlight => println!("[{}] {}", time, event.message.bright_green()),
            LogKind::Warning => println!("[{}] {}", time, event.message.yellow()),
            LogKind::Error => eprintln!("[{}] {}", time, event.message.red()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transmit {
            text,
            tone,
            save,
            output_dir,
            device,
        } => transmit_command(&text, &tone, save, output_dir, device)?,
        Commands::Encode { text, output, tone } => encode_command(&text, &output, &tone)?,
        Commands::Bits { text } => bits_command(&text)?,
    }

    Ok(())
}

#[cfg(feature = "cpal-audio")]
fn audio_backend(device: Option<String>) -> Arc<dyn AudioBackend> {
    use rttywave_core::cpal_output::CpalBackend;

    match device {
        Some(name) => Arc::new(CpalBackend::new().with_device(name)),
        None => Arc::new(CpalBackend::new()),
    }
}

#[cfg(not(feature = "cpal-audio"))]
fn audio_backend(device: Option<String>) -> Arc<dyn AudioBackend> {
    if let Some(name) = device {
        log::warn!("ignoring --device {}: built without audio support", name);
    }
    Arc::new(rttywave_core::NoAudioBackend)
}

fn transmit_command(
    text: &str,
    tone: &ToneArgs,
    save: bool,
    output_dir: PathBuf,
    device: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = tone.resolve()?;
    if save {
        config.save_to_file = true;
    }

    let mut transmitter = Transmitter::new(audio_backend(device), Arc::new(TerminalSink))
        .with_store(Arc::new(DirectoryStore::new(output_dir)));

    transmitter.transmit(text, &config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let interrupted =
        runtime.block_on(watch_playback(|| transmitter.is_active(), tokio::signal::ctrl_c()));
    if interrupted {
        transmitter.stop();
    }
    transmitter.wait();
    Ok(())
}

/// Poll until playback ends or `interrupt` fires. Returns true on interrupt.
async fn watch_playback<F>(is_active: impl Fn() -> bool, interrupt: F) -> bool
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(interrupt);
    let mut ticker = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));

    loop {
        tokio::select! {
            result = &mut interrupt => {
                if let Err(e) = result {
                    log::warn!("failed to wait for Ctrl+C: {}", e);
                    return false;
                }
                return true;
            }
            _ = ticker.tick() => {
                if !is_active() {
                    return false;
                }
            }
        }
    }
}

fn encode_command(
    text: &str,
    output_path: &Path,
    tone: &ToneArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = tone.resolve()?;
    let sink = TerminalSink;

    let encoding = match BaudotEncoder::with_verbose(config.verbose).encode(text) {
        Ok(encoding) => encoding,
        Err(err) => {
            sink.report(LogEvent::error(format!("Error: {}", err)));
            return Err(err.into());
        }
    };
    for event in &encoding.events {
        sink.report(event.clone());
    }

    let synthesis = FskSynthesizer::new().synthesize(&encoding.bits, &config.tone_params())?;
    println!(
        "Encoded {} symbols ({} bit units) to {} audio samples ({:.1} s)",
        encoding.symbols.len(),
        encoding.bits.len(),
        synthesis.samples.len(),
        synthesis.duration_secs()
    );

    let file = BufWriter::new(File::create(output_path)?);
    write_wav(file, &synthesis.samples)?;

    println!("Wrote {}", output_path.display());
    Ok(())
}

fn bits_command(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let encoding = BaudotEncoder::new().encode(text)?;

    for c in &encoding.skipped {
        println!("skipped unsupported character '{}'", c);
    }
    for (symbol, units) in encoding
        .symbols
        .iter()
        .zip(encoding.bits.chunks(rttywave_core::baudot::UNITS_PER_SYMBOL))
    {
        let code = ita2::lookup(*symbol).map(|c| ita2::format_code(&c)).unwrap_or_default();
        println!(
            "{:<5} {}  {}",
            symbol.to_string(),
            code,
            rttywave_core::baudot::format_bits(units)
        );
    }
    println!("Total bit units: {}", encoding.bits.len());

    Ok(())
}
