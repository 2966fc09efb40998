//! Command dispatch: bridges CLI args -> core client calls -> output formatting.

pub mod admin;
pub mod config_cmd;
pub mod session;
pub mod snapshot;
pub mod util;
pub mod watch;
pub mod write;

use scadalink_core::TelemetryClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = resolved.session()?;
    let client = TelemetryClient::new(resolved.client.clone(), session)?;

    match cmd {
        Command::Login(args) => session::login(&client, resolved, args, global).await,
        Command::Logout => session::logout(&client, resolved, global),
        Command::Whoami => session::whoami(&client, global).await,
        Command::Watch(args) => watch::handle(&client, args, global).await,
        Command::Snapshot(args) => snapshot::handle(&client, args, global).await,
        Command::Write(args) => write::handle(&client, args, global).await,
        Command::Admin(args) => admin::handle(&client, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to server dispatch".into(),
        )),
    }
}
