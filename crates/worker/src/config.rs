use std::path::PathBuf;

use transcoder_core::ffmpeg::DEFAULT_SUBTITLE_LIMIT;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
#[error("{name} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults matching the container deployment. A `.env`
/// file is honoured because `main` calls `dotenvy::dotenv()` first.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Library root scanned recursively for source files.
    pub input_dir: PathBuf,
    /// Base URL of the Jellyfin server.
    pub jellyfin_url: String,
    /// Jellyfin API key. Library refreshes are disabled when empty.
    pub jellyfin_api_key: String,
    /// Port of the metrics server. Values `<= 0` disable it.
    pub metrics_port: i32,
    /// DRM render node used for VAAPI.
    pub render_device: PathBuf,
    /// SQLite file backing the skip tracker.
    pub skip_db_path: PathBuf,
    /// Value of `LIBVA_DRIVER_NAME` passed to ffmpeg.
    pub libva_driver: String,
    /// Maximum number of subtitle streams burned in per file.
    pub subtitle_limit: usize,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var               | Default                     |
    /// |-----------------------|-----------------------------|
    /// | `INPUT_DIR`           | `in_test`                   |
    /// | `JELLYFIN_URL`        | `http://jellyfin:8096`      |
    /// | `JELLYFIN_API`        | (empty, refresh disabled)   |
    /// | `METRICS_PORT`        | `9100`                      |
    /// | `VAAPI_RENDER_DEVICE` | `/dev/dri/renderD128`       |
    /// | `TRANSCODE_SKIP_DB`   | `/db/skip_tracker.sqlite3`  |
    /// | `LIBVA_DRIVER_NAME`   | `radeonsi`                  |
    /// | `SUBTITLE_LIMIT`      | `3`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let metrics_port_raw = var("METRICS_PORT", "9100");
        let metrics_port = metrics_port_raw
            .trim()
            .parse::<i32>()
            .map_err(|_| ConfigError {
                name: "METRICS_PORT",
                expected: "an integer",
                value: metrics_port_raw.clone(),
            })?;
        if metrics_port > i32::from(u16::MAX) {
            return Err(ConfigError {
                name: "METRICS_PORT",
                expected: "at most 65535",
                value: metrics_port_raw,
            });
        }

        let subtitle_limit_raw = var("SUBTITLE_LIMIT", &DEFAULT_SUBTITLE_LIMIT.to_string());
        let subtitle_limit = subtitle_limit_raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError {
                name: "SUBTITLE_LIMIT",
                expected: "a non-negative integer",
                value: subtitle_limit_raw.clone(),
            })?;

        Ok(Self {
            input_dir: PathBuf::from(var("INPUT_DIR", "in_test")),
            jellyfin_url: var("JELLYFIN_URL", "http://jellyfin:8096")
                .trim_end_matches('/')
                .to_string(),
            jellyfin_api_key: var("JELLYFIN_API", ""),
            metrics_port,
            render_device: PathBuf::from(var("VAAPI_RENDER_DEVICE", "/dev/dri/renderD128")),
            skip_db_path: expand_home(&var("TRANSCODE_SKIP_DB", "/db/skip_tracker.sqlite3")),
            libva_driver: var("LIBVA_DRIVER_NAME", "radeonsi"),
            subtitle_limit,
        })
    }

    /// The metrics port, or `None` when the server is disabled.
    pub fn metrics_port(&self) -> Option<u16> {
        u16::try_from(self.metrics_port).ok().filter(|p| *p > 0)
    }

    pub fn jellyfin_enabled(&self) -> bool {
        !self.jellyfin_api_key.is_empty()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(raw),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("in_test"));
        assert_eq!(config.jellyfin_url, "http://jellyfin:8096");
        assert!(!config.jellyfin_enabled());
        assert_eq!(config.metrics_port(), Some(9100));
        assert_eq!(config.render_device, PathBuf::from("/dev/dri/renderD128"));
        assert_eq!(config.skip_db_path, PathBuf::from("/db/skip_tracker.sqlite3"));
        assert_eq!(config.libva_driver, "radeonsi");
        assert_eq!(config.subtitle_limit, 3);
    }

    #[test]
    fn overrides() {
        let config = config_with(&[
            ("INPUT_DIR", "/media"),
            ("JELLYFIN_URL", "http://jf:8096/"),
            ("JELLYFIN_API", "secret"),
            ("METRICS_PORT", "0"),
            ("SUBTITLE_LIMIT", "1"),
        ])
        .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/media"));
        assert_eq!(config.jellyfin_url, "http://jf:8096");
        assert!(config.jellyfin_enabled());
        assert_eq!(config.metrics_port(), None);
        assert_eq!(config.subtitle_limit, 1);
    }

    #[test]
    fn negative_metrics_port_disables_server() {
        let config = config_with(&[("METRICS_PORT", "-1")]).unwrap();
        assert_eq!(config.metrics_port(), None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_with(&[("METRICS_PORT", "abc")]).unwrap_err();
        assert_eq!(err.name, "METRICS_PORT");
        assert!(config_with(&[("METRICS_PORT", "70000")]).is_err());
        assert!(config_with(&[("SUBTITLE_LIMIT", "-2")]).is_err());
    }

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        assert_eq!(expand_home("/db/x.sqlite3"), PathBuf::from("/db/x.sqlite3"));
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/db/x.sqlite3"), home.join("db/x.sqlite3"));
            assert_eq!(expand_home("~"), home);
        }
    }
}
