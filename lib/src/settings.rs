use std::env;
use std::path::PathBuf;

use shellexpand::tilde;

/// Default admission bound, used when `MAX_CPUS` isn't set in the environment.
pub(crate) fn default_max_cpus() -> usize {
    2
}

pub(crate) fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub(crate) fn default_port() -> u16 {
    7080
}

fn default_log_path() -> PathBuf {
    PathBuf::from(tilde("~/batch_queue.log").into_owned())
}

/// The daemon's runtime configuration.
///
/// There's no on-disk config file: every field here is either a fixed default or sourced
/// from a single environment variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// The admission bound. Read from `MAX_CPUS` at daemon start.
    pub max_cpus: usize,
    /// The RPC bind address.
    pub host: String,
    /// The RPC bind port.
    pub port: u16,
    /// Upper bound on the number of tasks that may be Queued or Paused at once.
    /// `None` means unbounded. No environment variable or CLI flag is specified for
    /// this, so it's only ever set programmatically (e.g. in tests).
    pub max_queue_len: Option<usize>,
    /// Where the daemon's own log output is appended.
    pub log_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_cpus: default_max_cpus(),
            host: default_host(),
            port: default_port(),
            max_queue_len: None,
            log_path: default_log_path(),
        }
    }
}

impl Settings {
    /// Build the daemon's settings from the process environment.
    /// `MAX_CPUS` is the only variable the external interface defines; everything else
    /// keeps its compiled-in default.
    pub fn from_env() -> Settings {
        let mut settings = Settings::default();

        if let Ok(raw) = env::var("MAX_CPUS") {
            match raw.parse::<usize>() {
                Ok(value) if value > 0 => settings.max_cpus = value,
                _ => log::warn!("Ignoring invalid MAX_CPUS value: {raw:?}"),
            }
        }

        settings
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_cpus, 2);
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 7080);
        assert_eq!(settings.max_queue_len, None);
    }
}
