//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use scadalink_config::{Config, Profile, TokenStoreKind};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts, TokenStoreArg};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn token_store_kind(arg: TokenStoreArg) -> TokenStoreKind {
    match arg {
        TokenStoreArg::Keyring => TokenStoreKind::Keyring,
        TokenStoreArg::File => TokenStoreKind::File,
        TokenStoreArg::Memory => TokenStoreKind::Memory,
    }
}

fn format_config(cfg: &Config) -> String {
    let mut lines = vec![
        format!(
            "Default profile: {}",
            cfg.default_profile.as_deref().unwrap_or("-")
        ),
        format!("Output:          {}", cfg.defaults.output),
        format!("Color:           {}", cfg.defaults.color),
        format!("Insecure:        {}", cfg.defaults.insecure),
        format!("Timeout:         {}s", cfg.defaults.timeout),
    ];
    let mut names: Vec<&String> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        lines.push(String::new());
        lines.push(format!("[{name}]"));
        lines.push(format!("  server:      {}", p.server));
        lines.push(format!(
            "  username:    {}",
            p.username.as_deref().unwrap_or("-")
        ));
        lines.push(format!("  token_store: {:?}", p.token_store));
        if p.classifier.is_some() {
            lines.push("  classifier:  custom tables".into());
        }
    }
    lines.join("\n")
}

#[derive(Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Default")]
    default: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init) => init_profile(init, global),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.active_profile_name(None);
            let mut rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    name: name.clone(),
                    server: p.server.clone(),
                    default: if *name == default { "*".into() } else { String::new() },
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            let out = output::render_list(
                &global.output,
                &rows,
                |r| ProfileRow {
                    name: r.name.clone(),
                    server: r.server.clone(),
                    default: r.default.clone(),
                },
                |r| r.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available.join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

fn init_profile(init: ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);

    let profile = Profile {
        server: init.server,
        username: init.username,
        token_store: token_store_kind(init.token_store),
        ca_cert: init.ca_cert,
        insecure: global.insecure.then_some(true),
        ..Profile::default()
    };
    // Reject a bad URL before anything is written.
    scadalink_config::profile_to_client_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!(
            "Profile '{profile_name}' written to {}",
            config::config_path().display()
        );
        eprintln!("Next: scadalink login");
    }
    Ok(())
}
