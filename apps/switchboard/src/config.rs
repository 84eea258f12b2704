/// Gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Redis connection string. When set, session stores live in Redis;
    /// otherwise they are kept in process memory.
    pub redis_url: Option<String>,
    /// Namespaces clients may join, normalized to start with `/`.
    /// The root namespace `/` is always available.
    pub namespaces: Vec<String>,
    /// A connection with no inbound traffic for this long is closed.
    pub ping_timeout_secs: u64,
    /// Capacity of each connection's outbound packet queue.
    pub send_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4100,
            redis_url: None,
            namespaces: vec!["/".to_string()],
            ping_timeout_secs: 60,
            send_queue_capacity: 256,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            namespaces: std::env::var("NAMESPACES")
                .map(|v| parse_namespaces(&v))
                .unwrap_or(defaults.namespaces),
            ping_timeout_secs: parsed_var("PING_TIMEOUT_SECS").unwrap_or(defaults.ping_timeout_secs),
            send_queue_capacity: parsed_var("SEND_QUEUE_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.send_queue_capacity),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Split a comma-separated namespace list. Each entry gets a leading `/`,
/// blanks are dropped, and `/` is always present.
pub fn parse_namespaces(raw: &str) -> Vec<String> {
    let mut names = vec!["/".to_string()];
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = if part.starts_with('/') {
            part.to_string()
        } else {
            format!("/{part}")
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_namespaces_always_includes_root() {
        assert_eq!(parse_namespaces(""), vec!["/"]);
        assert_eq!(parse_namespaces("/chat"), vec!["/", "/chat"]);
    }

    #[test]
    fn parse_namespaces_normalizes_and_dedups() {
        let names = parse_namespaces(" chat, /game ,,/chat, / ");
        assert_eq!(names, vec!["/", "/chat", "/game"]);
    }
}
