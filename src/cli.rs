use extcarve::reconstruct::DEFAULT_EXTENSION;
use extcarve::scanner::DEFAULT_CHUNK_SIZE;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Max bytes copied by `extract` unless `--maxsize` is given.
pub const CLI_DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "extcarve")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect ext2/3/4 images and carve files by signature", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the whole image for known file signatures
    Scan {
        image: PathBuf,

        /// Write matches as JSON to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Only scan for these signatures (e.g. png,jpeg)
        #[arg(short = 't', long, value_delimiter = ',')]
        types: Option<Vec<String>>,
    },

    /// Copy bytes starting at a raw offset into a file
    Extract {
        image: PathBuf,

        /// Decimal or 0x-prefixed hex
        #[arg(value_parser = parse_offset)]
        offset: u64,

        #[arg(long, default_value_t = CLI_DEFAULT_MAX_SIZE)]
        maxsize: u64,

        #[arg(long, default_value = "recovered")]
        outdir: PathBuf,

        #[arg(long, default_value = DEFAULT_EXTENSION)]
        ext: String,

        /// Write a chain-of-custody sidecar next to the output
        #[arg(long)]
        custody: bool,
    },

    /// Decode the primary superblock
    Superblock {
        image: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Decode one inode (block group 0 only)
    Inode {
        image: PathBuf,
        num: u64,

        #[arg(long)]
        json: bool,
    },

    /// Rebuild an inode's content from its block pointers
    RecoverInode {
        image: PathBuf,
        num: u64,

        #[arg(long, default_value = "recovered_inode")]
        outdir: PathBuf,

        /// Output file name (default: inode_<num>_rec)
        #[arg(long)]
        filename: Option<String>,

        #[arg(long)]
        custody: bool,
    },
}

pub fn parse_offset(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid offset '{s}': {e}"))
}

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn for_scan(image_size: u64) -> Self {
        let bar = ProgressBar::new(image_size);
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn set_position(&self, scanned: u64) {
        self.bar.set_position(scanned);
    }

    pub fn set_matches(&self, found: usize) {
        self.bar.set_message(format!("{found} matches"));
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn offsets_accept_hex_and_decimal() {
        assert_eq!(parse_offset("2097152"), Ok(2_097_152));
        assert_eq!(parse_offset("0x200000"), Ok(2_097_152));
        assert_eq!(parse_offset("0XFF"), Ok(255));
        assert!(parse_offset("-1").is_err());
        assert!(parse_offset("0xZZ").is_err());
    }

    #[test]
    fn extract_defaults() {
        let cli = Cli::parse_from(["extcarve", "extract", "disk.img", "0x10"]);
        match cli.command {
            Commands::Extract {
                offset,
                maxsize,
                outdir,
                ext,
                custody,
                ..
            } => {
                assert_eq!(offset, 16);
                assert_eq!(maxsize, CLI_DEFAULT_MAX_SIZE);
                assert_eq!(outdir, PathBuf::from("recovered"));
                assert_eq!(ext, ".bin");
                assert!(!custody);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["extcarve", "inode", "disk.img", "12", "--json", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Inode { num: 12, json: true, .. }));
    }
}
