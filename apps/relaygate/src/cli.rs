use std::path::PathBuf;

use clap::Parser;

/// Flags for the relaygate binary. Every flag has an env fallback so the
/// process can be driven entirely by environment variables in a
/// service-manager unit.
#[derive(Parser)]
#[command(name = "relaygate")]
pub struct Cli {
    #[arg(long, env = "RELAYGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, env = "RELAYGATE_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(long, env = "RELAYGATE_PORT", default_value_t = 8135)]
    pub port: u16,
}
