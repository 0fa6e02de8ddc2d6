use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network identity of a node: the `(host, port)` pair it listens on.
///
/// Used as the key everywhere a node is referred to (peer views, seed tables,
/// gossip sender annotations). The host is kept as text because that is how it
/// travels on the wire and how correlation checks compare it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Builds an endpoint from separately transmitted host and port fields.
    pub fn from_parts(host: &str, port: &str) -> Result<Self, ProtocolError> {
        let host = host.trim();
        if host.is_empty() || host.contains([':', ';', ',']) {
            return Err(ProtocolError::InvalidEndpoint(host.to_string()));
        }

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ProtocolError::InvalidPort(port.to_string()))?;

        Ok(Self::new(host, port))
    }

    /// Address tuple accepted by `TcpStream::connect` / `TcpListener::bind`.
    pub fn addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((host, port)) => Self::from_parts(host, port),
            None => Err(ProtocolError::InvalidEndpoint(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display_and_parse() {
        let endpoint = Endpoint::new("127.0.0.1", 5000);
        assert_eq!(endpoint.to_string(), "127.0.0.1:5000");

        let parsed: Endpoint = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":5000".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
        assert!("a:b:1".parse::<Endpoint>().is_err());
    }
}
