//Command line interface
// runtime configuration (listen address, capture overrides)
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use packet_log::CaptureConfig;
use world_protocol::DEFAULT_WORLD_PORT;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub capture: CaptureConfig,
}

#[derive(Parser, Debug, Clone)]
pub struct Cli {
    #[arg(long, default_value_t = format!("0.0.0.0:{DEFAULT_WORLD_PORT}"))]
    pub bind_addr: String,
    /// TOML file with capture settings (`enabled`, `file`, `logs_dir`, ...)
    #[arg(long)]                                   pub config: Option<PathBuf>,
    /// Enables capture into this file
    #[arg(long)]                                   pub packet_log_file: Option<PathBuf>,
    #[arg(long)]                                   pub logs_dir: Option<PathBuf>,
}

impl Cli {
    pub fn parse_and_build_config() -> Result<Config> {
        <Cli as Parser>::parse().build()
    }

    fn build(self) -> Result<Config> {
        let mut capture = CaptureConfig::load(self.config.as_deref())?;
        if let Some(file) = self.packet_log_file {
            capture.enabled = true;
            capture.file = file;
        }
        if let Some(dir) = self.logs_dir {
            capture.logs_dir = Some(dir);
        }
        Ok(Config {
            bind_addr: self.bind_addr,
            capture,
        })
    }
}
