//! TOML-based planning configuration.
//!
//! Stores the knobs the placement pass reads:
//! - Workday window and horizon
//! - Session block size bounds
//! - Hour-of-day preference weights
//! - Optional per-day study cap
//! - Recompute debounce
//!
//! Configuration is stored at `~/.config/studyplan/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, Result};

/// Planning configuration.
///
/// Serialized to/from TOML at `~/.config/studyplan/config.toml`. Every
/// placement-affecting field participates in the scheduling digest, so
/// editing one triggers a recompute; `debounce_ms` only tunes the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSettings {
    /// First hour of the day sessions may start in (local-naive, 0-23).
    #[serde(default = "default_workday_start")]
    pub workday_start_hour: u32,
    /// Hour the workday ends at; sessions never cross it.
    #[serde(default = "default_workday_end")]
    pub workday_end_hour: u32,
    /// Fallback lower bound for session length, minutes.
    #[serde(default = "default_min_block")]
    pub min_block_minutes: u32,
    /// Fallback upper bound for session length, minutes.
    #[serde(default = "default_max_block")]
    pub max_block_minutes: u32,
    /// How far ahead dateless work may be placed, days.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Per-day study cap in minutes. 0 disables the cap.
    #[serde(default)]
    pub max_study_minutes_per_day: u32,
    /// Preference weight per hour of day. Ranks starts within a day;
    /// never moves a session to a later day.
    #[serde(default = "default_hour_weights")]
    pub hour_weights: [f64; 24],
    /// Recompute debounce window, milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

// Default functions
fn default_workday_start() -> u32 {
    9
}
fn default_workday_end() -> u32 {
    17
}
fn default_min_block() -> u32 {
    20
}
fn default_max_block() -> u32 {
    90
}
fn default_horizon_days() -> u32 {
    14
}
fn default_hour_weights() -> [f64; 24] {
    [1.0; 24]
}
fn default_debounce_ms() -> u64 {
    300
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            workday_start_hour: default_workday_start(),
            workday_end_hour: default_workday_end(),
            min_block_minutes: default_min_block(),
            max_block_minutes: default_max_block(),
            horizon_days: default_horizon_days(),
            max_study_minutes_per_day: 0,
            hour_weights: default_hour_weights(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl PlanningSettings {
    /// Preference weight for an hour of day. Out-of-range hours rank last.
    pub fn hour_weight(&self, hour: usize) -> f64 {
        self.hour_weights.get(hour).copied().unwrap_or(0.0)
    }

    /// Load settings from disk, writing defaults on first run.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let settings = Self::default();
            settings.save()?;
            return Ok(settings);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let settings: Self = toml::from_str(&text).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save settings to disk as TOML.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, text).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.workday_end_hour <= self.workday_start_hour || self.workday_end_hour > 24 {
            return Err(ConfigError::InvalidValue {
                key: "workday_end_hour".to_string(),
                message: format!(
                    "workday window {}..{} is empty or out of range",
                    self.workday_start_hour, self.workday_end_hour
                ),
            }
            .into());
        }
        if self.min_block_minutes == 0 || self.max_block_minutes < self.min_block_minutes {
            return Err(ConfigError::InvalidValue {
                key: "max_block_minutes".to_string(),
                message: format!(
                    "block bounds {}..{} are invalid",
                    self.min_block_minutes, self.max_block_minutes
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Read one setting by key, rendered for display.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "workday_start_hour" => Some(self.workday_start_hour.to_string()),
            "workday_end_hour" => Some(self.workday_end_hour.to_string()),
            "min_block_minutes" => Some(self.min_block_minutes.to_string()),
            "max_block_minutes" => Some(self.max_block_minutes.to_string()),
            "horizon_days" => Some(self.horizon_days.to_string()),
            "max_study_minutes_per_day" => Some(self.max_study_minutes_per_day.to_string()),
            "debounce_ms" => Some(self.debounce_ms.to_string()),
            _ => None,
        }
    }

    /// Update one setting by key and persist.
    ///
    /// # Errors
    /// Returns an error for unknown keys, unparseable values, or values
    /// that fail validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_u32 = |v: &str| {
            v.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{v}' is not a whole number"),
            })
        };
        match key {
            "workday_start_hour" => self.workday_start_hour = parse_u32(value)?,
            "workday_end_hour" => self.workday_end_hour = parse_u32(value)?,
            "min_block_minutes" => self.min_block_minutes = parse_u32(value)?,
            "max_block_minutes" => self.max_block_minutes = parse_u32(value)?,
            "horizon_days" => self.horizon_days = parse_u32(value)?,
            "max_study_minutes_per_day" => self.max_study_minutes_per_day = parse_u32(value)?,
            "debounce_ms" => {
                self.debounce_ms = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("'{value}' is not a whole number"),
                })?
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "unknown setting".to_string(),
                }
                .into())
            }
        }
        self.validate()?;
        self.save()?;
        Ok(())
    }
}
