use crate::domain::day_clock::{DEFAULT_BOUNDARY_HOUR, DayBoundary};
use crate::domain::models::Category;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const CATEGORIES_JSON: &str = "categories.json";
const DEFAULT_USER_ID: &str = "local";
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 200;

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayGrid",
                "timezone": "UTC",
                "dayBoundaryHour": DEFAULT_BOUNDARY_HOUR,
                "userId": DEFAULT_USER_ID,
                "saveDebounceMs": DEFAULT_SAVE_DEBOUNCE_MS,
                "remote": {
                    "baseUrl": null,
                    "bearerToken": null
                }
            }),
        ),
        (
            CATEGORIES_JSON,
            serde_json::json!({
                "schema": 1,
                "categories": [
                    { "id": "study", "label": "Study", "color": "#4f46e5" },
                    { "id": "work", "label": "Work", "color": "#0ea5e9" },
                    { "id": "exercise", "label": "Exercise", "color": "#22c55e" },
                    { "id": "rest", "label": "Rest", "color": "#f59e0b" },
                    { "id": "other", "label": "Other", "color": "#94a3b8" }
                ]
            }),
        ),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub app_name: String,
    pub timezone: Tz,
    pub day_boundary_hour: u32,
    pub user_id: String,
    pub save_debounce_ms: u64,
    pub remote_base_url: Option<String>,
    pub remote_bearer_token: Option<String>,
}

impl AppConfig {
    pub fn day_boundary(&self) -> Result<DayBoundary, InfraError> {
        DayBoundary::new(self.timezone, self.day_boundary_hour).map_err(InfraError::InvalidConfig)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "DayGrid".to_string(),
            timezone: Tz::UTC,
            day_boundary_hour: DEFAULT_BOUNDARY_HOUR,
            user_id: DEFAULT_USER_ID.to_string(),
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            remote_base_url: None,
            remote_bearer_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAppConfig {
    app_name: Option<String>,
    timezone: Option<String>,
    day_boundary_hour: Option<u32>,
    user_id: Option<String>,
    save_debounce_ms: Option<u64>,
    #[serde(default)]
    remote: RawRemoteConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRemoteConfig {
    base_url: Option<String>,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategories {
    #[serde(default)]
    categories: Vec<Category>,
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw: RawAppConfig = serde_json::from_value(read_config(&path)?)?;
    let defaults = AppConfig::default();

    let timezone = match non_blank(raw.timezone) {
        Some(name) => name.parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{name}' in {}: {error}", path.display()))
        })?,
        None => defaults.timezone,
    };

    let config = AppConfig {
        app_name: non_blank(raw.app_name).unwrap_or(defaults.app_name),
        timezone,
        day_boundary_hour: raw.day_boundary_hour.unwrap_or(defaults.day_boundary_hour),
        user_id: non_blank(raw.user_id).unwrap_or(defaults.user_id),
        save_debounce_ms: raw.save_debounce_ms.unwrap_or(defaults.save_debounce_ms),
        remote_base_url: non_blank(raw.remote.base_url),
        remote_bearer_token: non_blank(raw.remote.bearer_token),
    };
    config.day_boundary()?;
    Ok(config)
}

/// Reads the category palette. Invalid or duplicate entries are skipped.
pub fn load_palette(config_dir: &Path) -> Result<Vec<Category>, InfraError> {
    let raw: RawCategories = serde_json::from_value(read_config(&config_dir.join(CATEGORIES_JSON))?)?;
    let mut seen = HashSet::new();
    let mut palette = Vec::with_capacity(raw.categories.len());
    for category in raw.categories {
        if let Err(reason) = category.validate() {
            tracing::warn!(id = %category.id, %reason, "skipping invalid palette entry");
            continue;
        }
        if !seen.insert(category.id.clone()) {
            tracing::warn!(id = %category.id, "skipping duplicate palette entry");
            continue;
        }
        palette.push(category);
    }
    Ok(palette)
}
