use anyhow::{Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
  pub api_key: Option<String>,
  pub theme_name: Option<String>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "flick") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "flick") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }
}

/// Resolve the OMDb API key: CLI flag, then `OMDB_API_KEY`, then the config
/// file. The key is required; resolution failure is a startup error so the
/// terminal is never put into raw mode without one.
pub fn resolve_api_key(cli: Option<&str>) -> Result<String> {
  if let Some(key) = cli
    && !key.trim().is_empty()
  {
    return Ok(key.to_string());
  }
  if let Ok(key) = std::env::var("OMDB_API_KEY")
    && !key.trim().is_empty()
  {
    return Ok(key);
  }
  if let Some(key) = Config::load().api_key
    && !key.trim().is_empty()
  {
    return Ok(key);
  }
  bail!("No OMDb API key configured. Pass --api-key, set OMDB_API_KEY, or put `api_key = \"...\"` in prefs.toml")
}
