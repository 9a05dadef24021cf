pub mod server;

use cadence_engine::EngineConfig;
use cadence_server::ServerConfig;

/// Build the server configuration from `CADENCE_*` environment
/// variables, falling back to defaults for anything unset.
pub fn config_from_env() -> ServerConfig {
    let defaults = ServerConfig::default();
    let engine_defaults = EngineConfig::default();

    ServerConfig {
        bind_host: env_string("CADENCE_BIND_HOST").unwrap_or(defaults.bind_host),
        rest_port: env_parsed("CADENCE_REST_PORT").unwrap_or(defaults.rest_port),
        cors_allowed_origins: env_string("CADENCE_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        engine_config: EngineConfig {
            data_dir: env_string("CADENCE_DATA_DIR").unwrap_or(engine_defaults.data_dir),
            latest_limit: env_parsed("CADENCE_LATEST_LIMIT").unwrap_or(engine_defaults.latest_limit),
        },
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|s| s.trim().parse().ok())
}
