//! Provider names and function endpoint addressing.

use serde::{Deserialize, Serialize};

/// A FaaS provider a step is deployed to.
///
/// Workflow files name providers as plain strings. Names the relay has no
/// adapter for are kept as [`Provider::Other`] so the failure surfaces at
/// dispatch time rather than when the file is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provider {
    Aws,
    OpenWhisk,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "aws",
            Self::OpenWhisk => "openWhisk",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for Provider {
    fn from(value: String) -> Self {
        match value.as_str() {
            "aws" => Self::Aws,
            "openWhisk" => Self::OpenWhisk,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Provider {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<Provider> for String {
    fn from(value: Provider) -> Self {
        value.as_str().to_owned()
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a step's function is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEndpoint {
    pub hostname: String,
    pub path: String,
    /// Defaults to `https`; `http` is accepted for local deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl FunctionEndpoint {
    pub fn new(hostname: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            path: path.into(),
            scheme: None,
            port: None,
        }
    }

    pub fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or("https")
    }

    /// Port used for connecting, falling back to the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.scheme() == "http" { 80 } else { 443 })
    }

    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.scheme(), self.hostname, port, self.path),
            None => format!("{}://{}{}", self.scheme(), self.hostname, self.path),
        }
    }
}

impl std::fmt::Display for FunctionEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.hostname, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip_through_strings() {
        let parsed: Vec<Provider> =
            serde_json::from_str(r#"["aws", "openWhisk", "gcp"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Provider::Aws, Provider::OpenWhisk, Provider::Other("gcp".into())]
        );
        assert_eq!(serde_json::to_string(&Provider::OpenWhisk).unwrap(), r#""openWhisk""#);
    }

    #[test]
    fn endpoint_url_defaults_to_https() {
        let endpoint = FunctionEndpoint::new("example.com", "/default/fn");
        assert_eq!(endpoint.url(), "https://example.com/default/fn");
        assert_eq!(endpoint.effective_port(), 443);
    }

    #[test]
    fn endpoint_url_honours_scheme_and_port() {
        let endpoint: FunctionEndpoint = serde_json::from_str(
            r#"{"hostname": "localhost", "path": "/", "scheme": "http", "port": 8080}"#,
        )
        .unwrap();
        assert_eq!(endpoint.url(), "http://localhost:8080/");
        assert_eq!(endpoint.effective_port(), 8080);
    }
}
