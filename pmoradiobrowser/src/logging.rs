//! Tracing subscriber setup driven by the `host.logger` configuration section

use pmoconfig::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Build the filter: `RUST_LOG` wins, then `host.logger.min_level`
pub fn env_filter(config: &Config) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();

    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// Does nothing if a subscriber is already installed, so it is safe to call
/// from several entry points.
pub fn init_logging(config: &Config) {
    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let fmt_layer = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    let _ = Registry::default()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config =
            Config::from_yaml_str("host:\n  logger:\n    min_level: WARN\n").unwrap();
        assert_eq!(
            env_filter(&config).max_level_hint(),
            Some(tracing::level_filters::LevelFilter::WARN)
        );
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let config = Config::from_yaml_str("").unwrap();
        init_logging(&config);
        init_logging(&config);
        tracing::info!("logging initialised");
    }
}
