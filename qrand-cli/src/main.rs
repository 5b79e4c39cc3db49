// SPDX-License-Identifier: MIT
//
// qrand: Quantum Random Values from Buffered Entropy
// Copyright (c) 2025 qrand Contributors

//! qrand - command-line front end for the qrand core library
//!
//! Loads configuration, builds the configured entropy backend, puts a bit
//! cache in front of it and prints the requested random values.
//!
//! ```text
//! ┌──────────────┐   batches    ┌──────────────┐    values    ┌──────────────┐
//! │   Backend    │ ───────────> │   BitCache   │ ───────────> │    stdout    │
//! │ (sim / http) │              │ + QuantumRng │              │ (text/json)  │
//! └──────────────┘              └──────────────┘              └──────────────┘
//! ```
//!
//! Logs go to stderr so stdout carries only values. Cached entropy is
//! drained before exit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qrand_core::{
    Backend, BitCache, Complex64, ComplexPolar, ComplexRect, EntropySource, QrandConfig,
    QuantumRng,
};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "qrand")]
#[command(about = "qrand - Uniform random values from quantum entropy", long_about = None)]
struct Args {
    /// Path to a YAML configuration file (defaults to QRAND_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Output format for generated values
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Number of values to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Raw random bits
    Bits {
        /// Number of bits
        #[arg(short, long, default_value_t = 8)]
        bits: usize,

        /// Print packed bytes as hex instead of 0/1 characters
        #[arg(long)]
        hex: bool,
    },
    /// Integer from the inclusive range [min, max]
    Int {
        #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
        min: i64,

        #[arg(short = 'M', long, allow_negative_numbers = true, default_value_t = 100)]
        max: i64,
    },
    /// Unsigned 32-bit integer
    Int32,
    /// Unsigned 64-bit integer
    Int64,
    /// Single-precision float from [min, max)
    Float {
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        min: f32,

        #[arg(short = 'M', long, allow_negative_numbers = true, default_value_t = 1.0)]
        max: f32,
    },
    /// Double-precision float from [min, max)
    Double {
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        min: f64,

        #[arg(short = 'M', long, allow_negative_numbers = true, default_value_t = 1.0)]
        max: f64,
    },
    /// Complex number with independent real and imaginary parts
    ComplexRect {
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        real_min: f64,

        #[arg(long, allow_negative_numbers = true, default_value_t = 1.0)]
        real_max: f64,

        /// Defaults to --real-min
        #[arg(long, allow_negative_numbers = true)]
        img_min: Option<f64>,

        /// Defaults to --real-max
        #[arg(long, allow_negative_numbers = true)]
        img_max: Option<f64>,
    },
    /// Complex number uniform over a disk sector
    ComplexPolar {
        #[arg(long, default_value_t = 1.0)]
        radius: f64,

        /// Sector angle in radians
        #[arg(long, default_value_t = std::f64::consts::TAU)]
        theta: f64,
    },
    /// Version 4 UUID
    Uuid,
}

/// One generated value
#[derive(Debug, Clone, PartialEq)]
enum Sample {
    Bits(String),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Complex(Complex64),
    Uuid(String),
}

impl Sample {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Sample::Bits(s) | Sample::Uuid(s) => serde_json::json!(s),
            Sample::Int(v) => serde_json::json!(v),
            Sample::UInt(v) => serde_json::json!(v),
            Sample::Float(v) => serde_json::json!(v),
            Sample::Double(v) => serde_json::json!(v),
            Sample::Complex(z) => serde_json::json!({ "re": z.re, "im": z.im }),
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Bits(s) | Sample::Uuid(s) => f.write_str(s),
            Sample::Int(v) => write!(f, "{}", v),
            Sample::UInt(v) => write!(f, "{}", v),
            Sample::Float(v) => write!(f, "{}", v),
            Sample::Double(v) => write!(f, "{}", v),
            Sample::Complex(z) => write!(f, "{}", z),
        }
    }
}

/// Generate one value for `command`
async fn generate<S: EntropySource>(rng: &QuantumRng<S>, command: &Command) -> Result<Sample> {
    let sample = match command {
        Command::Bits { bits, hex } => {
            let taken = rng.random_bits(*bits).await?;
            if *hex {
                Sample::Bits(hex::encode(taken.to_bytes()))
            } else {
                Sample::Bits(taken.to_string())
            }
        }
        Command::Int { min, max } => Sample::Int(rng.random_int(*min, *max).await?),
        Command::Int32 => Sample::UInt(u64::from(rng.random_int32().await?)),
        Command::Int64 => Sample::UInt(rng.random_int64().await?),
        Command::Float { min, max } => Sample::Float(rng.random_float(*min, *max).await?),
        Command::Double { min, max } => Sample::Double(rng.random_double(*min, *max).await?),
        Command::ComplexRect {
            real_min,
            real_max,
            img_min,
            img_max,
        } => {
            let rect = ComplexRect {
                real_min: *real_min,
                real_max: *real_max,
                img_min: *img_min,
                img_max: *img_max,
            };
            Sample::Complex(rng.random_complex_rect(&rect).await?)
        }
        Command::ComplexPolar { radius, theta } => Sample::Complex(
            rng.random_complex_polar(&ComplexPolar::new(*radius, *theta))
                .await?,
        ),
        Command::Uuid => Sample::Uuid(rng.random_uuid().await?.to_string()),
    };
    Ok(sample)
}

/// Generate `count` values
async fn generate_many<S: EntropySource>(
    rng: &QuantumRng<S>,
    command: &Command,
    count: usize,
) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();
    for _ in 0..count {
        samples.push(generate(rng, command).await?);
    }
    Ok(samples)
}

fn render(samples: &[Sample], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(samples
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => {
            let values: Vec<_> = samples.iter().map(Sample::to_json).collect();
            serde_json::to_string(&values).context("Failed to serialize values")
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<QrandConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from file: {:?}", path);
            QrandConfig::from_file(path).context("Failed to load configuration from file")
        }
        None => {
            info!("Loading configuration from environment variables");
            QrandConfig::from_env().context("Failed to load configuration from environment")
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let log_level = level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    let builder = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    info!("qrand v{}", qrand_core::VERSION);

    let config = load_config(args.config.as_ref())?;
    info!("Backend: {:?}", config.backend);
    info!("Channel width: {} bits", config.channel_width);

    let backend = Backend::from_config(&config).context("Failed to create entropy backend")?;
    let cache = BitCache::new(backend).context("Failed to create bit cache")?;
    if config.prefill_bits > 0 {
        cache
            .prefill(config.prefill_bits)
            .await
            .context("Failed to prefill bit cache")?;
        info!("Prefilled {} bits", cache.buffered().await);
    }
    let rng = QuantumRng::new(cache);

    let result = generate_many(&rng, &args.command, args.count).await;

    // Unused entropy never outlives the process
    let discarded = rng.cache().drain().await;
    let stats = rng.cache().stats();
    info!(
        batches = stats.batches_requested,
        fetched = stats.bits_fetched,
        served = stats.bits_served,
        discarded,
        rejections = rng.rejections(),
        "Bit cache drained"
    );

    let samples = result?;
    println!("{}", render(&samples, args.format)?);
    Ok(())
}
