//! failures of individual import sites
//!
//! A failing site never stops the resolution of its siblings or ancestors. Every failure is recorded as a
//! [SiteFailure] and handed back to the caller in one [AggregatedError].
use crate::document::ImportKind;
use crate::fetch::FetchError;
use crate::loader::LoadError;
use crate::location::SourceLocation;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("local file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to fetch remote file")]
    Fetch(#[from] FetchError),
    #[error("unable to parse imported file")]
    Parse(#[from] LoadError),
    #[error("import cycle detected: {chain}")]
    CycleDetected { chain: String },
}

/// One failed import site, identified by its declaration
#[derive(Debug, derive_new::new)]
pub struct SiteFailure {
    pub kind: ImportKind,
    pub key: String,
    pub location: SourceLocation,
    /// The document that declared the import
    pub document: String,
    pub error: ImportError,
}

impl std::fmt::Display for SiteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} import `{}` at {}:{}: {}",
            self.kind, self.key, self.document, self.location, self.error
        )?;

        let mut source = std::error::Error::source(&self.error);
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }

        Ok(())
    }
}

#[derive(Debug, Default, derive_new::new)]
pub struct AggregatedError {
    #[new(default)]
    failures: Vec<SiteFailure>,
}

impl AggregatedError {
    pub fn log(&mut self, failure: SiteFailure) {
        tracing::warn!(
            kind = %failure.kind,
            key = %failure.key,
            location = %failure.location,
            document = %failure.document,
            error = %failure.error,
            "import failed"
        );
        self.failures.push(failure);
    }

    pub fn append(&mut self, other: AggregatedError) {
        self.failures.extend(other.failures);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteFailure> {
        self.failures.iter()
    }

    /// `None` when nothing failed
    pub fn into_option(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

impl IntoIterator for AggregatedError {
    type Item = SiteFailure;
    type IntoIter = std::vec::IntoIter<SiteFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl std::error::Error for AggregatedError {}

impl std::fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} import(s) failed to resolve", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}
