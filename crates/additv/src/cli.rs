//! Clap derive structures for the `additv` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use additv_core::TelemetryProfile;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// additv -- printer-side bridge to the Additv backend
#[derive(Debug, Parser)]
#[command(
    name = "additv",
    version,
    about = "Ship printer telemetry and lifecycle events to the Additv backend",
    long_about = "Bridges a 3D-printer host to the Additv backend.\n\n\
        Reads the controller's status lines, decodes and filters telemetry,\n\
        and delivers it with lifecycle events through a retrying write queue.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding additv.toml
    #[arg(long, env = "ADDITV_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request timeout in seconds
    #[arg(long, env = "ADDITV_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,

    /// Extra CA certificate (PEM) to trust
    #[arg(long, env = "ADDITV_CA_CERT", global = true)]
    pub ca_cert: Option<PathBuf>,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exchange a one-time registration token for printer credentials
    Register(RegisterArgs),

    /// Stream controller lines from stdin to the backend
    Stream(StreamArgs),

    /// Publish a single host lifecycle event
    Event(EventArgs),

    /// Report print progress for a job
    Progress(ProgressArgs),

    /// Fetch the next queued print job
    NextJob,

    /// Show the stored connection settings (secrets redacted)
    Status,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Registration token issued by the backend
    #[arg(long, env = "ADDITV_REGISTRATION_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Display name for this printer
    #[arg(long)]
    pub name: String,

    /// Backend URL (stored for later commands)
    #[arg(long, env = "ADDITV_URL")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProfileArg {
    /// Separate temperature and fan report lines
    MultiLine,
    /// One combined status line
    SingleLine,
    /// Virtual printer, forward every reading
    Simulation,
}

impl From<ProfileArg> for TelemetryProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::MultiLine => Self::MultiLine,
            ProfileArg::SingleLine => Self::SingleLine,
            ProfileArg::Simulation => Self::Simulation,
        }
    }
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Status-line format of the controller
    #[arg(long, value_enum, default_value = "multi-line")]
    pub profile: ProfileArg,

    /// Readings per telemetry write
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u16).range(1..))]
    pub batch_size: u16,

    /// Flush a partial batch after this many seconds
    #[arg(long, default_value = "30")]
    pub flush_secs: u64,
}

#[derive(Debug, Args)]
pub struct EventArgs {
    /// Host event name, e.g. PrintStarted
    pub name: String,

    /// JSON object attached to the event
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Backend job identifier
    #[arg(long)]
    pub job_id: String,

    /// Completion percentage (0-100)
    #[arg(long)]
    pub percent: f64,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
