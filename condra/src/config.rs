use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use condra_lib::memory::pointer::parse_offset;
use condra_lib::{Endianness, OffsetChain, Pattern, Signature, ValueKind};
use serde::Deserialize;

pub const DEFAULT_PROCESS: &str = "DARKSOULS.exe";
pub const DEFAULT_PATTERN: &str = "8b 0d ? ? ? ? 8b 41 30 8b 4d 64";
pub const DEFAULT_OFFSETS: &[i64] = &[2, 0];
pub const DEFAULT_DATA_OFFSET: i64 = 0x68;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Delay between attempts to find the process or its pointer.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Parser, Debug, Default)]
#[command(name = "condra")]
#[command(about = "Reads the in-game timer out of a running game process")]
pub struct Args {
    /// TOML file describing the target; flags override its values
    #[arg(short, long, env = "CONDRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Executable name of the target, matched exactly
    #[arg(short, long, env = "CONDRA_PROCESS")]
    pub process: Option<String>,

    /// Byte signature, e.g. "8b 0d ? ? ? ?"
    #[arg(long)]
    pub pattern: Option<String>,

    /// Comma-separated pointer chain offsets, e.g. "2,0"
    #[arg(long, allow_hyphen_values = true)]
    pub offsets: Option<String>,

    /// Offset of the value from the resolved pointer
    #[arg(long, allow_hyphen_values = true)]
    pub data_offset: Option<String>,

    /// Value type: u8, i8, u16, i16, u32, i32, u64, i64, f32, f64
    #[arg(long)]
    pub kind: Option<String>,

    /// Byte order of the target: little or big
    #[arg(long)]
    pub endian: Option<String>,

    /// Polling interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Print a single value and exit
    #[arg(long)]
    pub once: bool,
}

/// Target description as read from a TOML file.
#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TargetFile {
    pub process: Option<String>,
    pub pattern: Option<String>,
    pub offsets: Option<Vec<i64>>,
    pub data_offset: Option<i64>,
    pub kind: Option<String>,
    pub endian: Option<String>,
    pub interval_ms: Option<u64>,
}

impl TargetFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub process: String,
    pub signature: Signature,
    pub data_offset: i64,
    pub kind: ValueKind,
    pub endianness: Endianness,
    pub interval: Duration,
    pub retry_delay: Duration,
    pub once: bool,
}

impl TargetConfig {
    /// Layers command-line flags over the optional target file over the
    /// built-in defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => TargetFile::load(path)?,
            None => TargetFile::default(),
        };

        let process = args
            .process
            .or(file.process)
            .unwrap_or_else(|| DEFAULT_PROCESS.to_string());

        let pattern = args
            .pattern
            .or(file.pattern)
            .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
        let pattern = pattern
            .parse::<Pattern>()
            .with_context(|| format!("bad pattern {pattern:?}"))?;

        let offsets = match (args.offsets, file.offsets) {
            (Some(offsets), _) => offsets
                .parse::<OffsetChain>()
                .with_context(|| format!("bad offsets {offsets:?}"))?,
            (None, Some(offsets)) => OffsetChain::new(offsets),
            (None, None) => OffsetChain::new(DEFAULT_OFFSETS.to_vec()),
        };

        let data_offset = match args.data_offset {
            Some(offset) => parse_offset(&offset)?,
            None => file.data_offset.unwrap_or(DEFAULT_DATA_OFFSET),
        };

        let kind = match args.kind.or(file.kind) {
            Some(kind) => kind.parse::<ValueKind>()?,
            None => ValueKind::U32,
        };

        let endianness = match args.endian.or(file.endian) {
            Some(endian) => endian.parse::<Endianness>().map_err(anyhow::Error::msg)?,
            None => Endianness::default(),
        };

        let interval = args
            .interval_ms
            .or(file.interval_ms)
            .map_or(DEFAULT_INTERVAL, Duration::from_millis);

        Ok(Self {
            process,
            signature: Signature::new(pattern, offsets),
            data_offset,
            kind,
            endianness,
            interval,
            retry_delay: RETRY_DELAY,
            once: args.once,
        })
    }
}
