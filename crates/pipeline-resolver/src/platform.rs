//! per-platform behaviour
//!
//! Everything that differs between the supported CI dialects is selected through [Platform]: how a file is loaded,
//! how a remote file is addressed and how credentials are presented. Scanning and merging work on the shared
//! [crate::document::Document] shape and do not care.
use crate::config::EndpointConfig;
use crate::document::Document;
use crate::fetch::AuthScheme;
use crate::loader::{self, LoadError};
use crate::source::ConcreteSource;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitHub,
    Azure,
    GitLab,
    Bitbucket,
}

impl Platform {
    /// Parse raw bytes as a document of this platform
    pub fn parse(self, bytes: &[u8]) -> Result<Document, LoadError> {
        match self {
            Platform::GitHub => loader::github::load(bytes),
            Platform::Azure => loader::azure::load(bytes),
            Platform::GitLab => loader::gitlab::load(bytes),
            Platform::Bitbucket => loader::bitbucket::load(bytes),
        }
    }

    /// Address of the raw content of a remote file
    ///
    /// `None` when this platform cannot fetch remote files or a field the platform needs is missing.
    pub fn remote_url(self, endpoints: &EndpointConfig, source: &ConcreteSource) -> Option<String> {
        match self {
            Platform::GitHub => Some(format!(
                "{}/{}/{}/{}/{}",
                endpoints.github.trim_end_matches('/'),
                source.organization,
                source.repository,
                source.reference.as_deref().unwrap_or("main"),
                source.path,
            )),
            Platform::Azure => {
                let project = source.project.as_deref().filter(|p| !p.is_empty())?;
                let mut url = format!(
                    "{}/{}/{}/_apis/git/repositories/{}/items?path={}",
                    endpoints.azure.trim_end_matches('/'),
                    source.organization,
                    project,
                    source.repository,
                    source.path,
                );
                if let Some(reference) = &source.reference {
                    url.push_str("&versionDescriptor.versionType=tag&version=");
                    url.push_str(reference);
                }
                Some(url)
            }
            Platform::GitLab => {
                let project = format!("{}/{}", source.organization, source.repository);
                let mut url = format!(
                    "{}/api/v4/projects/{}/repository/files/{}/raw",
                    endpoints.gitlab.trim_end_matches('/'),
                    encode(&project),
                    encode(&source.path),
                );
                if let Some(reference) = &source.reference {
                    url.push_str("?ref=");
                    url.push_str(&encode(reference));
                }
                Some(url)
            }
            Platform::Bitbucket => None,
        }
    }

    pub fn auth_scheme(self) -> Option<AuthScheme> {
        match self {
            Platform::GitHub => Some(AuthScheme::Token),
            Platform::Azure => Some(AuthScheme::Basic),
            Platform::GitLab => Some(AuthScheme::Bearer),
            Platform::Bitbucket => None,
        }
    }

    /// Guess the platform from a well-known pipeline file location
    pub fn detect(path: &Path) -> Option<Platform> {
        let file_name = path.file_name()?.to_string_lossy().to_lowercase();
        match file_name.as_str() {
            ".gitlab-ci.yml" | ".gitlab-ci.yaml" => return Some(Platform::GitLab),
            "bitbucket-pipelines.yml" | "bitbucket-pipelines.yaml" => {
                return Some(Platform::Bitbucket)
            }
            "azure-pipelines.yml" | "azure-pipelines.yaml" => return Some(Platform::Azure),
            _ => {}
        }

        let in_workflows_dir = path
            .parent()
            .map(|parent| parent.ends_with(".github/workflows"))
            .unwrap_or(false);
        if in_workflows_dir {
            return Some(Platform::GitHub);
        }

        None
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::GitHub => f.write_str("github"),
            Platform::Azure => f.write_str("azure"),
            Platform::GitLab => f.write_str("gitlab"),
            Platform::Bitbucket => f.write_str("bitbucket"),
        }
    }
}

/// Percent-encode one url path segment or query value, spaces as `%20`
fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
