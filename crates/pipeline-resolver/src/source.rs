//! where an import points
//!
//! A [SourceDescriptor] is what a declaration says. It may be under-specified (only an alias) until it is turned into
//! a [Target] with the help of the [crate::alias::AliasRegistry] and the resolution context.
use crate::platform::Platform;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceDescriptor {
    /// A file in the same repository as the declaring document
    Local { path: String },
    /// A file in the repository of the root pipeline, wherever the declaring document came from
    Root { path: String },
    /// A file in another repository, possibly only named through an alias
    Remote {
        scm: Platform,
        #[serde(skip_serializing_if = "Option::is_none")]
        organization: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        repository: Option<String>,
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    /// Declared, but not something this engine can fetch (e.g. a vendor-hosted built-in template)
    Unsupported { declaration: String },
}

impl SourceDescriptor {
    pub fn local(path: impl Into<String>) -> Self {
        Self::Local { path: path.into() }
    }

    /// Remote file named through a repository alias
    pub fn aliased(scm: Platform, alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Remote {
            scm,
            organization: None,
            repository: None,
            path: path.into(),
            alias: Some(alias.into()),
            reference: None,
        }
    }
}

/// Fully specified coordinates of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConcreteSource {
    pub scm: Platform,
    pub organization: String,
    /// Azure DevOps project, unused elsewhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub repository: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ConcreteSource {
    /// organization, repository and path are all present
    pub fn is_complete(&self) -> bool {
        !self.organization.is_empty() && !self.repository.is_empty() && !self.path.is_empty()
    }

    /// Another file in the same repository at the same reference
    pub fn sibling(&self, path: &str) -> Self {
        Self {
            path: normalize_path(path),
            ..self.clone()
        }
    }
}

/// A descriptor resolved far enough to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local(PathBuf),
    Remote(ConcreteSource),
}

impl Target {
    /// Stable identity used for cycle detection
    pub fn key(&self) -> SourceKey {
        match self {
            Target::Local(path) => SourceKey(format!("local:{}", path.display())),
            Target::Remote(source) => SourceKey(format!(
                "{}:{}/{}{}@{}:{}",
                source.scm,
                source.organization,
                source
                    .project
                    .as_deref()
                    .map(|project| format!("{project}/"))
                    .unwrap_or_default(),
                source.repository,
                source.reference.as_deref().unwrap_or(""),
                source.path,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repository-relative form of a declared path: no leading `./` or `/`
pub fn normalize_path(path: &str) -> String {
    let mut path = path.trim();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            return path.to_string();
        }
    }
}

/// Split a git ref into its short name (`refs/heads/main` and `refs/tags/main` both become `main`)
pub fn short_ref(reference: &str) -> &str {
    reference
        .strip_prefix("refs/heads/")
        .or_else(|| reference.strip_prefix("refs/tags/"))
        .unwrap_or(reference)
}
