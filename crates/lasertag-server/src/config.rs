use serde::Deserialize;

use lasertag_engine::config::CombatConfig;

/// Top-level server configuration, loaded from `lasertag.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
    pub combat: CombatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            web_root: "public".to_string(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub player_message_buffer: usize,
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            player_message_buffer: 64,
            ws_rate_limit_per_sec: 20.0,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Grace period before an empty or finished session is destroyed.
    pub cleanup_delay_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            cleanup_delay_secs: 30,
        }
    }
}

impl SessionsConfig {
    pub fn cleanup_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_delay_secs)
    }
}

impl ServerConfig {
    /// Validate configuration, logging and exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.sessions.cleanup_delay_secs == 0 {
            tracing::error!("sessions.cleanup_delay_secs must be > 0");
            std::process::exit(1);
        }
        if self.combat.battle_duration_secs == 0 {
            tracing::error!("combat.battle_duration_secs must be > 0");
            std::process::exit(1);
        }
        if self.combat.max_players == 0 {
            tracing::error!("combat.max_players must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `lasertag.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("lasertag.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from lasertag.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse lasertag.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No lasertag.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("LASERTAG_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("LASERTAG_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(val) = std::env::var("LASERTAG_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("LASERTAG_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}
