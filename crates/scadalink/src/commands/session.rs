//! Login, logout and whoami.

use secrecy::SecretString;

use scadalink_core::{CurrentUser, TelemetryClient};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn login(
    client: &TelemetryClient,
    resolved: &Resolved,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let username = match args.username.or_else(|| resolved.profile.username.clone()) {
        Some(u) => u,
        None => util::prompt_line("Username: ")?,
    };
    if username.is_empty() {
        return Err(CliError::Validation {
            field: "username".into(),
            reason: "username cannot be empty".into(),
        });
    }

    let password = if args.password_stdin {
        util::read_stdin_line()?
    } else {
        rpassword::prompt_password("Password: ")?
    };
    let password = SecretString::from(password);

    client.login(&username, &password).await?;

    if !global.quiet {
        eprintln!(
            "Logged in as {username} (profile '{}', {})",
            resolved.profile_name,
            resolved.client.url
        );
    }
    Ok(())
}

pub fn logout(
    client: &TelemetryClient,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let was_logged_in = client.session().is_authenticated();
    client.logout();
    if !global.quiet {
        if was_logged_in {
            eprintln!("Logged out of profile '{}'", resolved.profile_name);
        } else {
            eprintln!("Not logged in");
        }
    }
    Ok(())
}

fn user_detail(u: &CurrentUser) -> String {
    [
        format!("ID:           {}", u.id),
        format!("Email:        {}", u.email),
        format!(
            "Organization: {}",
            u.organization_id.as_deref().unwrap_or("-")
        ),
        format!(
            "Default park: {}",
            u.default_park_id.as_deref().unwrap_or("-")
        ),
        format!("Superuser:    {}", u.is_superuser),
        format!("Active:       {}", u.is_active),
        format!("Can write:    {}", u.can_write()),
    ]
    .join("\n")
}

pub async fn whoami(client: &TelemetryClient, global: &GlobalOpts) -> Result<(), CliError> {
    let user = client
        .current_user()
        .await
        .map_err(|e| util::session_error(client, e))?;
    let out = output::render_single(&global.output, &user, user_detail, |u| u.email.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
