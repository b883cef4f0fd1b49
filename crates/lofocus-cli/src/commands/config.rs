use clap::Subcommand;
use lofocus_core::{Config, Preferences};

use super::timer::apply_config_to_saved_timer;
use super::AppContext;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "timer.focus_minutes", "remote.base_url")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value (empty clears an optional value)
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

/// Timer keys are also user preferences: keep the stored preferences and a
/// saved timer in step with the file.
async fn sync_timer_settings(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::open(config.clone())?;
    let store = ctx.preferences();
    let prefs = Preferences {
        config: config.timer,
        ..store.load_local(config.timer)
    };
    if let Some(handle) = store.save(&prefs, ctx.identity.as_ref())? {
        handle.await?;
    }
    apply_config_to_saved_timer(&ctx, config.timer).await
}

pub async fn run(action: ConfigAction, mut config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(format!("unknown key: {key}").into()),
        },
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            if key.starts_with("timer.") {
                sync_timer_settings(&config).await?;
            }
            println!("ok");
        }
        ConfigAction::List => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            sync_timer_settings(&config).await?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
