use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::import::delimited::ColumnMapping;
use crate::{ClientError, ClientResult};

pub const DEFAULT_COMPARISON_MONTHS: u32 = 12;
pub const DEFAULT_PAY_DAY: u32 = 28;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub csv_profiles: BTreeMap<String, ColumnMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default = "default_comparison_months")]
    pub comparison_months: u32,
    #[serde(default = "default_pay_day")]
    pub pay_day: u32,
    /// Profile used for CSV files when no `--profile` is given.
    #[serde(default)]
    pub csv_profile: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            comparison_months: DEFAULT_COMPARISON_MONTHS,
            pay_day: DEFAULT_PAY_DAY,
            csv_profile: None,
        }
    }
}

fn default_comparison_months() -> u32 {
    DEFAULT_COMPARISON_MONTHS
}

fn default_pay_day() -> u32 {
    DEFAULT_PAY_DAY
}

impl Settings {
    pub fn load(path: &Path) -> ClientResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .map_err(|error| ClientError::config_invalid(path, &error.to_string()))?;
        Self::from_toml(path, &raw)
    }

    pub fn from_toml(path: &Path, raw: &str) -> ClientResult<Self> {
        let settings: Settings =
            toml::from_str(raw).map_err(|error| ClientError::config_invalid(path, &error.to_string()))?;
        settings.validate(path)?;
        Ok(settings)
    }

    /// Resolves a CSV profile by name, falling back to the configured default.
    pub fn csv_profile(&self, name: Option<&str>) -> ClientResult<Option<&ColumnMapping>> {
        let Some(name) = name.or(self.defaults.csv_profile.as_deref()) else {
            return Ok(None);
        };
        match self.csv_profiles.get(name) {
            Some(mapping) => Ok(Some(mapping)),
            None => Err(ClientError::invalid_argument_with_recovery(
                &format!("CSV profile `{name}` is not defined."),
                vec![
                    "Define it under `[csv_profiles.<name>]` in config.toml.".to_string(),
                    format!(
                        "Known profiles: {}.",
                        if self.csv_profiles.is_empty() {
                            "none".to_string()
                        } else {
                            self.csv_profiles.keys().cloned().collect::<Vec<_>>().join(", ")
                        }
                    ),
                ],
            )),
        }
    }

    fn validate(&self, path: &Path) -> ClientResult<()> {
        if !(1..=31).contains(&self.defaults.pay_day) {
            return Err(ClientError::config_invalid(
                path,
                "`defaults.pay_day` must be between 1 and 31.",
            ));
        }
        if self.defaults.comparison_months > 120 {
            return Err(ClientError::config_invalid(
                path,
                "`defaults.comparison_months` must be at most 120.",
            ));
        }
        if let Some(name) = &self.defaults.csv_profile
            && !self.csv_profiles.contains_key(name)
        {
            return Err(ClientError::config_invalid(
                path,
                &format!("`defaults.csv_profile` names unknown profile `{name}`."),
            ));
        }
        for (name, mapping) in &self.csv_profiles {
            mapping
                .validate()
                .map_err(|detail| ClientError::config_invalid(path, &format!("profile `{name}`: {detail}")))?;
        }
        Ok(())
    }
}
