//! CLI-side configuration: `GlobalOpts` overrides on top of
//! `scadalink_config` profiles.
//!
//! Core never sees these types -- it receives a pre-built `ClientConfig`
//! and a restored `Session`.

use std::time::Duration;

use scadalink_config::{Config, Profile, open_session, profile_to_client_config};
use scadalink_core::{ClientConfig, Session, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use scadalink_config::{config_path, load_config_or_default, save_config};

/// Everything a server-bound command needs.
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub client: ClientConfig,
}

impl Resolved {
    /// Session restored from the profile's token store.
    pub fn session(&self) -> Result<Session, CliError> {
        Ok(open_session(&self.profile, &self.profile_name)?)
    }
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Translate the active profile + global flags into a `ClientConfig`.
///
/// With no matching profile, `--server` alone is enough: an ad-hoc
/// profile with default settings is used.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(p) => p.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    // Server (flag > env > profile)
    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if profile.server.is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let mut client = profile_to_client_config(&profile, &cfg.defaults)?;
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        client.timeout = Duration::from_secs(secs);
    }

    Ok(Resolved {
        profile_name,
        profile,
        client,
    })
}
