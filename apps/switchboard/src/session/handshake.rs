//! Connection-time metadata captured once per session.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The negotiated protocol variant carrying a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Websocket,
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Websocket => f.write_str("websocket"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" => Ok(Self::Websocket),
            "polling" => Ok(Self::Polling),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Immutable snapshot of the HTTP handshake that opened a session.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeData {
    /// Request headers, lowercased names. Repeated headers are joined with `, `.
    headers: BTreeMap<String, String>,
    /// Peer address at handshake time.
    address: SocketAddr,
    time: DateTime<Utc>,
    /// Request URI as received (path and query).
    url: String,
    url_params: HashMap<String, Vec<String>>,
    /// Whether the request was cross-origin (carried an `Origin` header).
    xdomain: bool,
}

impl HandshakeData {
    pub fn new(
        headers: &HeaderMap,
        address: SocketAddr,
        url: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Self {
        let mut header_map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            header_map
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let mut url_params: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in params {
            url_params.entry(key).or_default().push(value);
        }

        let xdomain = header_map.contains_key("origin");

        Self {
            headers: header_map,
            address,
            time: Utc::now(),
            url: url.into(),
            url_params,
            xdomain,
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_params(&self) -> &HashMap<String, Vec<String>> {
        &self.url_params
    }

    /// First value of a query parameter.
    pub fn single_param(&self, name: &str) -> Option<&str> {
        self.url_params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn is_xdomain(&self) -> bool {
        self.xdomain
    }
}
