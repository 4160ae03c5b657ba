use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Position sampling period while playing, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Volume pushed into the first engine before the user touches the slider.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MpvConfig {
    /// Extra command-line flags appended when spawning mpv.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Where the saved podcast list lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_dir")]
    pub dir: PathBuf,
}

impl PlayerConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would spin the sampler
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `default_volume` in `[0, 1]`; a NaN falls back to full volume.
    pub fn volume(&self) -> f32 {
        if self.default_volume.is_nan() {
            return default_volume();
        }
        self.default_volume.clamp(0.0, 1.0)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            default_volume: default_volume(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            dir: default_library_dir(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_volume() -> f32 {
    1.0
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_library_dir() -> PathBuf {
    platform::data_dir().join("library")
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            http: HttpConfig::default(),
            mpv: MpvConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.player.default_volume, 1.0);
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8990);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(config.mpv.extra_args.is_empty());
        assert!(config.library.dir.ends_with("castplay/library"));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("[player]\npoll_interval_ms = 250\n").unwrap();
        assert_eq!(config.player.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.player.default_volume, 1.0);
        assert_eq!(config.http.port, 8990);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config: Config = toml::from_str("[player]\npoll_interval_ms = 0\n").unwrap();
        assert_eq!(config.player.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_volume_is_clamped() {
        let loud: Config = toml::from_str("[player]\ndefault_volume = 3.5\n").unwrap();
        assert_eq!(loud.player.volume(), 1.0);
        let negative: Config = toml::from_str("[player]\ndefault_volume = -0.2\n").unwrap();
        assert_eq!(negative.player.volume(), 0.0);
        let nan: Config = toml::from_str("[player]\ndefault_volume = nan\n").unwrap();
        assert_eq!(nan.player.volume(), 1.0);
        let half: Config = toml::from_str("[player]\ndefault_volume = 0.5\n").unwrap();
        assert_eq!(half.player.volume(), 0.5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.http.port = 9000;
        config.mpv.extra_args = vec!["--ao=null".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.http.port, 9000);
        assert_eq!(loaded.mpv.extra_args, vec!["--ao=null".to_string()]);
    }
}
