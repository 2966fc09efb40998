//! Clap derive structures for the `scadalink` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// scadalink -- live telemetry and write-back for SCADA backends
#[derive(Debug, Parser)]
#[command(
    name = "scadalink",
    version,
    about = "Watch live SCADA telemetry and send setpoints from the command line",
    long_about = "A client for telemetry backends that aggregate industrial controllers.\n\n\
        Streams device snapshots over an authenticated WebSocket, reconnecting\n\
        on transient failures, and dispatches toggle and setpoint writes.",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "SCADALINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend URL (overrides profile)
    #[arg(long, short = 's', env = "SCADALINK_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SCADALINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SCADALINK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SCADALINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session token
    Login(LoginArgs),

    /// Discard the stored session token
    Logout,

    /// Show the account behind the current session
    Whoami,

    /// Stream live device snapshots until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Fetch the current device list once
    #[command(alias = "snap")]
    Snapshot(SnapshotArgs),

    /// Write a toggle or setpoint value to a device
    Write(WriteArgs),

    /// Manage users' park access (superuser only)
    Admin(AdminArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SESSION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (defaults to the profile's username, else prompts)
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Read the password from the first line of stdin
    #[arg(long)]
    pub password_stdin: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TELEMETRY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Show only this device (URL or name), with its data points
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Exit after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Show only this device (URL or name), with its data points
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Target device (URL or name)
    pub device: String,

    /// Writable data point (e.g. CMD_Active_Power_Setpoint_kW)
    pub field: String,

    /// New value: a number for setpoints, on/off for toggles
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ADMIN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List parks known to the server
    Parks,

    /// List user accounts
    #[command(alias = "ls")]
    Users(AdminUsersArgs),

    /// Show which parks a user can see
    Access {
        /// User ID or exact email
        user: String,
    },

    /// Give a user access to a park
    Grant {
        /// User ID or exact email
        user: String,
        /// Park ID (see `scadalink admin parks`)
        park: String,
    },

    /// Remove a user's access to a park
    Revoke {
        /// User ID or exact email
        user: String,
        /// Park ID
        park: String,
    },
}

#[derive(Debug, Args)]
pub struct AdminUsersArgs {
    /// Only emails containing this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,

    /// Filter by superuser flag
    #[arg(long)]
    pub superuser: Option<bool>,

    /// Filter by active flag
    #[arg(long)]
    pub active: Option<bool>,

    /// Maximum rows to return (1-500)
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Rows to skip
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or replace a profile
    Init(ConfigInitArgs),

    /// Display current configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Backend base URL (e.g. https://scada.example.com)
    #[arg(long)]
    pub server: String,

    /// Default username for `login`
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Where the session token is kept
    #[arg(long, value_enum, default_value = "keyring")]
    pub token_store: TokenStoreArg,

    /// Path to a custom CA certificate
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TokenStoreArg {
    /// System keyring
    Keyring,
    /// File under the user data directory
    File,
    /// Not persisted
    Memory,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
