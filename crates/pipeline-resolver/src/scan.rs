//! finding import sites
//!
//! [scan] lists every declaration of one document that pulls in another file. The order is fixed (defaults, extends,
//! then per job: the job import, its variables import and the imports of its pre-, main and post-steps) so output
//! is deterministic; merging never depends on it.
use crate::document::{Document, Import, ImportKind};
use crate::location::SourceLocation;
use crate::source::SourceDescriptor;
use crate::visit::VisitImports;
use serde::Serialize;

/// One declaration point inside a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSite {
    pub location: SourceLocation,
    /// The declaration as written
    pub key: String,
    pub descriptor: SourceDescriptor,
    pub kind: ImportKind,
}

impl ImportSite {
    fn new(kind: ImportKind, import: &Import) -> Self {
        Self {
            location: import.location,
            key: import.key.clone(),
            descriptor: import.source.clone(),
            kind,
        }
    }
}

#[tracing::instrument(level = "trace", skip_all)]
pub fn scan(document: &Document) -> Vec<ImportSite> {
    let mut sites = vec![];
    document.visit_imports(&mut |kind: ImportKind, import: &Import| {
        sites.push(ImportSite::new(kind, import));
    });

    tracing::trace!(sites = sites.len(), platform = %document.platform, "scanned document");
    sites
}
