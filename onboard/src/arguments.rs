use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Arguments {
    /// Service configuration, built-in defaults are used without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// UDP port to listen on for the ground station, overrides the configuration
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum log level
    #[arg(short, long, default_value = "info")]
    pub log_level: tracing::Level,
}
