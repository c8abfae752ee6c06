//! Domain models for rules, settings, and statistics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted intent to hide every element matching `selector` on `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Identity assigned by the store. Empty on freshly imported records.
    #[serde(default)]
    pub id: String,
    pub selector: String,
    pub domain: String,
    pub is_enabled: bool,
    /// RFC 3339 creation timestamp assigned by the store.
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A rule as produced by the picker, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub selector: String,
    pub domain: String,
    pub is_enabled: bool,
    pub label: Option<String>,
}

impl RuleDraft {
    /// Draft an enabled rule labelled with its own selector.
    pub fn for_selector(selector: impl Into<String>, domain: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            label: Some(selector.clone()),
            selector,
            domain: domain.into(),
            is_enabled: true,
        }
    }
}

/// User theme preference for injected UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the page environment's ambient color scheme.
    #[default]
    System,
}

impl Theme {
    /// Resolve the preference against the ambient scheme of the host environment.
    pub fn resolve(self, ambient_dark: bool) -> ColorScheme {
        match self {
            Theme::Light => ColorScheme::Light,
            Theme::Dark => ColorScheme::Dark,
            Theme::System if ambient_dark => ColorScheme::Dark,
            Theme::System => ColorScheme::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = ThemeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" | "auto" => Ok(Theme::System),
            other => Err(ThemeParseError::UnknownTheme(other.to_string())),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
            Theme::System => f.write_str("system"),
        }
    }
}

/// Error returned when parsing a [`Theme`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ThemeParseError {
    #[error("unknown theme '{0}'")]
    UnknownTheme(String),
}

/// Concrete palette picked once a [`Theme`] has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScheme::Light => f.write_str("light"),
            ColorScheme::Dark => f.write_str("dark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub whitelist_domains: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            theme: Theme::System,
            whitelist_domains: Vec::new(),
        }
    }
}

impl Settings {
    /// Whether stored rules should be applied on pages of `domain`.
    pub fn blocks_on(&self, domain: &str) -> bool {
        self.enabled && !self.whitelist_domains.iter().any(|entry| entry == domain)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_blocked: usize,
    pub domains_with_rules: usize,
    pub last_rule_created: Option<String>,
}
