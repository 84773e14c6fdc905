//! Configuration management commands.

use clap::Subcommand;
use studyplan_core::PlanningSettings;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the full configuration as TOML
    Show,
    /// Get a single value
    Get {
        /// Setting key, e.g. workday_start_hour
        key: String,
    },
    /// Set a value and persist it
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let settings = PlanningSettings::load()?;
            println!("{}", toml::to_string_pretty(&settings)?);
        }
        ConfigAction::Get { key } => {
            let settings = PlanningSettings::load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown setting '{key}'").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = PlanningSettings::load()?;
            settings.set(&key, &value)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
