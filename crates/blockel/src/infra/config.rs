//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::{config_dir, data_dir};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_STORE_FILE: &str = "blockel/rules.json";

/// Layered configuration loaded from defaults, user config, an explicit file, and env.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub picker: Picker,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Store {
    #[serde(default)]
    path: Option<PathBuf>,
}

impl Store {
    /// Rule store location, defaulting to the platform data directory.
    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picker {
    #[serde(default)]
    highlight_color: Option<String>,
    #[serde(default)]
    overlay_width: Option<f64>,
}

impl Picker {
    fn default_highlight_color() -> &'static str {
        crate::ui::highlight::DEFAULT_HIGHLIGHT_COLOR
    }

    fn default_overlay_width() -> f64 {
        crate::ui::overlay::DEFAULT_OVERLAY_WIDTH
    }

    pub fn highlight_color(&self) -> &str {
        self.highlight_color
            .as_deref()
            .unwrap_or(Self::default_highlight_color())
    }

    pub fn overlay_width(&self) -> f64 {
        self.overlay_width
            .filter(|width| width.is_finite() && *width > 0.0)
            .unwrap_or_else(Self::default_overlay_width)
    }
}

impl Default for Picker {
    fn default() -> Self {
        Self {
            highlight_color: Some(Self::default_highlight_color().to_owned()),
            overlay_width: Some(Self::default_overlay_width()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    #[serde(default = "Log::default_filter")]
    pub filter: String,
}

impl Log {
    fn default_filter() -> String {
        "info".into()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    store_path: Option<PathBuf>,
    log_filter: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            store_path: env::var_os("BLOCKEL_STORE").map(PathBuf::from),
            log_filter: env::var("BLOCKEL_LOG").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(store_path: &str, log_filter: &str) -> Self {
        Self {
            store_path: Some(PathBuf::from(store_path)),
            log_filter: Some(log_filter.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user config, `explicit` (if given), and env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit
            && !path.exists()
        {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let env = EnvOverrides::from_env();
        Self::load_with_layers(user_config_path(), explicit.map(Path::to_path_buf), env)
    }

    fn load_with_layers(
        user: Option<PathBuf>,
        explicit: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(user_path) = user.filter(|path| path.exists()) {
            layers.push(Self::from_file(&user_path)?);
        }

        if let Some(explicit_path) = explicit.filter(|path| path.exists()) {
            layers.push(Self::from_file(&explicit_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            store: merge_store(self.store, other.store),
            picker: merge_picker(self.picker, other.picker),
            log: merge_log(self.log, other.log),
        }
    }
}

fn merge_store(base: Store, overlay: Store) -> Store {
    Store {
        path: overlay.path.or(base.path),
    }
}

fn merge_picker(mut base: Picker, overlay: Picker) -> Picker {
    if let Some(value) = overlay.highlight_color {
        base.highlight_color = Some(value);
    }
    if let Some(value) = overlay.overlay_width {
        base.overlay_width = Some(value);
    }
    base
}

fn merge_log(base: Log, overlay: Log) -> Log {
    Log {
        filter: if overlay.filter != Log::default_filter() {
            overlay.filter
        } else {
            base.filter
        },
    }
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("blockel/config.toml"))
}

fn default_store_path() -> PathBuf {
    data_dir()
        .map(|base| base.join(DEFAULT_STORE_FILE))
        .unwrap_or_else(|| PathBuf::from(".blockel/rules.json"))
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(path) = env.store_path {
        config.store.path = Some(path);
    }
    if let Some(filter) = env.log_filter {
        config.log.filter = filter;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.picker.highlight_color(), "oklch(0.723 0.191 142.5)");
        assert_eq!(config.picker.overlay_width(), 320.0);
        assert_eq!(config.log.filter, "info");
        assert!(config.store.path().ends_with("rules.json"));
    }

    #[test]
    fn merge_user_and_explicit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let user = temp.path().join("config.toml");
        fs::write(
            &user,
            r##"
[picker]
highlight_color = "#ff00ff"
overlay_width = 400.0
[log]
filter = "debug"
"##,
        )?;

        let explicit = temp.path().join("explicit.toml");
        fs::write(
            &explicit,
            r#"
[store]
path = "/tmp/blockel-rules.json"
[picker]
overlay_width = 280.0
"#,
        )?;

        let config =
            Config::load_with_layers(Some(user), Some(explicit), EnvOverrides::default())?;

        assert_eq!(config.picker.highlight_color(), "#ff00ff");
        assert_eq!(config.picker.overlay_width(), 280.0);
        assert_eq!(config.log.filter, "debug");
        assert_eq!(config.store.path(), PathBuf::from("/tmp/blockel-rules.json"));

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("/srv/rules.json", "blockel=trace");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.store.path(), PathBuf::from("/srv/rules.json"));
        assert_eq!(config.log.filter, "blockel=trace");
        Ok(())
    }

    #[test]
    fn unset_picker_fields_borrow_defaults() -> Result<()> {
        let config = Config::from_str("[picker]\n")?;
        let picker = Picker {
            highlight_color: None,
            overlay_width: None,
        };
        assert_eq!(picker.highlight_color(), "oklch(0.723 0.191 142.5)");
        assert_eq!(picker.overlay_width(), 320.0);
        assert_eq!(config.picker.highlight_color(), picker.highlight_color());
        Ok(())
    }

    #[test]
    fn nonsensical_width_falls_back_to_default() -> Result<()> {
        let config = Config::from_str("[picker]\noverlay_width = -5.0\n")?;
        assert_eq!(config.picker.overlay_width(), 320.0);
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }
}
