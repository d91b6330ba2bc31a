use std::str::FromStr;

/// Server settings, read once from `ROOMLEDGER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
    pub max_connections: usize,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub seed_rooms: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5433,
            metrics_port: None,
            max_connections: 256,
            tls_cert: None,
            tls_key: None,
            seed_rooms: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind: lookup("ROOMLEDGER_BIND").unwrap_or(defaults.bind),
            port: parsed(&lookup, "ROOMLEDGER_PORT").unwrap_or(defaults.port),
            metrics_port: parsed(&lookup, "ROOMLEDGER_METRICS_PORT"),
            max_connections: parsed(&lookup, "ROOMLEDGER_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            tls_cert: lookup("ROOMLEDGER_TLS_CERT"),
            tls_key: lookup("ROOMLEDGER_TLS_KEY"),
            seed_rooms: lookup("ROOMLEDGER_SEED_ROOMS")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.seed_rooms),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
