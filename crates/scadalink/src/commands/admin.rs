//! Park access administration handlers.

use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use scadalink_core::{TelemetryClient, UserQuery, UserSummary};

use crate::cli::{AdminArgs, AdminCommand, AdminUsersArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Super")]
    is_superuser: String,
    #[tabled(rename = "Active")]
    is_active: String,
    #[tabled(rename = "Organization")]
    organization: String,
    #[tabled(rename = "Default Park")]
    default_park: String,
}

impl From<&UserSummary> for UserRow {
    fn from(u: &UserSummary) -> Self {
        Self {
            id: u.id.to_string(),
            email: u.email.clone(),
            is_superuser: yes_no(u.is_superuser).into(),
            is_active: yes_no(u.is_active).into(),
            organization: u.organization_id.clone().unwrap_or_else(|| "-".into()),
            default_park: u.default_park_id.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

#[derive(Tabled)]
struct ParkRow {
    #[tabled(rename = "Park")]
    park: String,
}

#[derive(Serialize)]
struct UserAccess {
    user: Uuid,
    parks: Vec<String>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ── Lookups ─────────────────────────────────────────────────────────

/// Accept a user ID, or an email matched exactly (case-insensitive).
async fn resolve_user(client: &TelemetryClient, identifier: &str) -> Result<Uuid, CliError> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }
    let query = UserQuery {
        search: Some(identifier.to_owned()),
        limit: 500,
        ..UserQuery::default()
    };
    let users = client
        .users(&query)
        .await
        .map_err(|e| util::session_error(client, e))?;
    users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(identifier))
        .map(|u| u.id)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "User".into(),
            identifier: identifier.into(),
            list_command: "admin users".into(),
        })
}

fn user_query(args: AdminUsersArgs) -> UserQuery {
    UserQuery {
        search: args.search,
        is_superuser: args.superuser,
        is_active: args.active,
        limit: args.limit,
        offset: args.offset,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &TelemetryClient,
    args: AdminArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AdminCommand::Parks => {
            let parks = client
                .parks()
                .await
                .map_err(|e| util::session_error(client, e))?;
            let out = output::render_list(
                &global.output,
                parks.as_slice(),
                |p| ParkRow { park: p.clone() },
                |p| p.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AdminCommand::Users(users_args) => {
            let users = client
                .users(&user_query(users_args))
                .await
                .map_err(|e| util::session_error(client, e))?;
            let out = output::render_list(
                &global.output,
                users.as_slice(),
                |u| UserRow::from(u),
                |u| u.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AdminCommand::Access { user } => {
            let id = resolve_user(client, &user).await?;
            let parks = client
                .user_parks(id)
                .await
                .map_err(|e| util::session_error(client, e))?;
            let access = UserAccess { user: id, parks };
            let out = output::render_single(
                &global.output,
                &access,
                |a| {
                    if a.parks.is_empty() {
                        format!("{} has no park access", a.user)
                    } else {
                        format!("Parks for {}:\n  {}", a.user, a.parks.join("\n  "))
                    }
                },
                |a| a.parks.join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AdminCommand::Grant { user, park } => {
            let id = resolve_user(client, &user).await?;
            client
                .grant_park(id, &park)
                .await
                .map_err(|e| util::session_error(client, e))?;
            if !global.quiet {
                eprintln!("Granted park '{}' to {user}", park.trim());
            }
            Ok(())
        }

        AdminCommand::Revoke { user, park } => {
            let id = resolve_user(client, &user).await?;
            client
                .revoke_park(id, &park)
                .await
                .map_err(|e| util::session_error(client, e))?;
            if !global.quiet {
                eprintln!("Revoked park '{}' from {user}", park.trim());
            }
            Ok(())
        }
    }
}
