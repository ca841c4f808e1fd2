//! retrieving the raw bytes of an import
//!
//! Local files are read from the repository root on disk. Remote files go through a [Transport]; the production
//! transport is a blocking [reqwest] client ([HttpTransport]), tests substitute their own.
use crate::config::{EndpointConfig, NetworkConfig};
use crate::error::ImportError;
use crate::source::{ConcreteSource, Target};
use base64::Engine;
use std::path::Path;
use std::time::Duration;

/// Authentication material, passed down unchanged to every remote fetch
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Token used as-is
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// base64 encoded `user:password`
    pub fn basic(user: &str, password: &str) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}")))
    }

    fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// How credentials are presented in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `token {value}`
    Token,
    /// `Basic {value}`
    Basic,
    /// `Bearer {value}`
    Bearer,
}

impl AuthScheme {
    pub fn header_value(self, credentials: &Credentials) -> String {
        match self {
            AuthScheme::Token => format!("token {}", credentials.value()),
            AuthScheme::Basic => format!("Basic {}", credentials.value()),
            AuthScheme::Bearer => format!("Bearer {}", credentials.value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues http GET requests
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response, FetchError>;
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self, reqwest::Error> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("pipeline-resolver/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let transport_error = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = request.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport_error)?.to_vec();

        Ok(Response { status, body })
    }
}

/// Reads local files and requests remote ones
pub struct Fetcher<T = HttpTransport> {
    endpoints: EndpointConfig,
    transport: T,
}

impl Fetcher<HttpTransport> {
    pub fn http(endpoints: EndpointConfig, network: &NetworkConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(endpoints, HttpTransport::new(network)?))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(endpoints: EndpointConfig, transport: T) -> Self {
        Self {
            endpoints,
            transport,
        }
    }

    /// Bytes of `target`, or `None` when a remote target is missing a required field
    pub fn fetch(
        &self,
        target: &Target,
        credentials: Option<&Credentials>,
    ) -> Result<Option<Vec<u8>>, ImportError> {
        match target {
            Target::Local(path) => fetch_local(path).map(Some),
            Target::Remote(source) => self.fetch_remote(source, credentials),
        }
    }

    pub fn fetch_remote(
        &self,
        source: &ConcreteSource,
        credentials: Option<&Credentials>,
    ) -> Result<Option<Vec<u8>>, ImportError> {
        if !source.is_complete() {
            tracing::trace!(?source, "incomplete remote source, not fetching");
            return Ok(None);
        }

        let Some(url) = source.scm.remote_url(&self.endpoints, source) else {
            tracing::trace!(?source, "no url for remote source, not fetching");
            return Ok(None);
        };

        let mut headers = vec![];
        if let (Some(credentials), Some(scheme)) = (credentials, source.scm.auth_scheme()) {
            headers.push(("Authorization".to_string(), scheme.header_value(credentials)));
        }

        tracing::debug!(%url, authenticated = !headers.is_empty(), "fetching remote file");
        let response = self.transport.get(&url, &headers)?;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::Status {
                url,
                status: response.status,
            }
            .into());
        }

        Ok(Some(response.body))
    }
}

pub fn fetch_local(path: &Path) -> Result<Vec<u8>, ImportError> {
    tracing::debug!(path=%path.display(), "reading local file");
    std::fs::read(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ImportError::NotFound(path.to_path_buf()),
        _ => ImportError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}
