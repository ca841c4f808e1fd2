//! attaching resolved sub-documents
//!
//! A [ResolvedImport] remembers the identity of the site it came from: its [SourceLocation], its [ImportKind] and its
//! key. [merge] attaches the sub-document to the one import that matches all three. The location decides; two
//! declarations of the same file at different places never receive each other's content.
use crate::document::{Document, Import, ImportKind};
use crate::location::SourceLocation;
use crate::visit::VisitImportsMut;
use std::collections::HashMap;

/// Outcome of resolving one import site
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImport {
    pub kind: ImportKind,
    pub location: SourceLocation,
    pub key: String,
    /// Raw bytes as fetched
    pub content: Option<Vec<u8>>,
    /// Present when fetching and parsing both succeeded
    pub document: Option<Document>,
}

type Identity = (SourceLocation, ImportKind, String);

/// Attach every resolved sub-document to its import, returns the number of attachments made
///
/// Imports that already carry a sub-document are left alone, so merging the same set twice changes nothing.
/// Resolved imports without a matching site are dropped.
#[tracing::instrument(level = "trace", skip_all)]
pub fn merge(document: &mut Document, resolved: Vec<ResolvedImport>) -> usize {
    let mut pending: HashMap<Identity, Document> = resolved
        .into_iter()
        .filter_map(|resolved| {
            let sub_document = resolved.document?;
            Some(((resolved.location, resolved.kind, resolved.key), sub_document))
        })
        .collect();

    let mut attached = 0;
    document.visit_imports_mut(&mut |kind: ImportKind, import: &mut Import| {
        if import.is_attached() {
            return;
        }

        let identity = (import.location, kind, import.key.clone());
        if let Some(sub_document) = pending.remove(&identity) {
            tracing::trace!(%kind, key = %import.key, location = %import.location, "attaching");
            import.pipeline = Some(Box::new(sub_document));
            attached += 1;
        }
    });

    for (location, kind, key) in pending.keys() {
        tracing::trace!(%kind, %key, %location, "no matching import, dropping");
    }

    attached
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::Job;
    use crate::platform::Platform;
    use crate::source::SourceDescriptor;
    use pretty_assertions::assert_eq;

    fn job_with_import(id: &str, line: usize, key: &str) -> Job {
        let mut job = Job::new(id.to_string(), SourceLocation::line(line, 5, 30));
        job.import = Some(Import::new(
            SourceLocation::line(line, 5, 30),
            key.to_string(),
            SourceDescriptor::local(key),
        ));
        job
    }

    fn named(name: &str) -> Document {
        let mut document = Document::new(Platform::Azure);
        document.name = Some(name.to_string());
        document
    }

    fn resolved(line: usize, key: &str, document: Option<Document>) -> ResolvedImport {
        ResolvedImport {
            kind: ImportKind::Job,
            location: SourceLocation::line(line, 5, 30),
            key: key.to_string(),
            content: None,
            document,
        }
    }

    fn attached_name<'a>(document: &'a Document, job: &str) -> Option<&'a str> {
        document
            .job(job)?
            .import
            .as_ref()?
            .pipeline
            .as_ref()?
            .name
            .as_deref()
    }

    #[test]
    fn same_key_attaches_by_location() {
        let mut document = Document::new(Platform::Azure);
        document.jobs.push(job_with_import("first", 4, "common.yml"));
        document.jobs.push(job_with_import("second", 9, "common.yml"));

        // completion order differs from document order
        let count = merge(
            &mut document,
            vec![
                resolved(9, "common.yml", Some(named("second content"))),
                resolved(4, "common.yml", Some(named("first content"))),
            ],
        );

        assert_eq!(count, 2);
        assert_eq!(attached_name(&document, "first"), Some("first content"));
        assert_eq!(attached_name(&document, "second"), Some("second content"));
    }

    #[test]
    fn merging_twice_changes_nothing() {
        let mut document = Document::new(Platform::Azure);
        document.jobs.push(job_with_import("build", 4, "build.yml"));
        let resolved = vec![resolved(4, "build.yml", Some(named("build")))];

        assert_eq!(merge(&mut document, resolved.clone()), 1);
        let merged = document.clone();

        assert_eq!(merge(&mut document, resolved), 0);
        assert_eq!(document, merged);
    }

    #[test]
    fn stale_identity_is_dropped() {
        let mut document = Document::new(Platform::Azure);
        document.jobs.push(job_with_import("build", 4, "build.yml"));

        let count = merge(
            &mut document,
            vec![
                resolved(5, "build.yml", Some(named("moved"))),
                resolved(4, "other.yml", Some(named("renamed"))),
            ],
        );

        assert_eq!(count, 0);
        assert_eq!(attached_name(&document, "build"), None);
    }

    #[test]
    fn failed_resolution_attaches_nothing() {
        let mut document = Document::new(Platform::Azure);
        document.jobs.push(job_with_import("build", 4, "build.yml"));

        assert_eq!(merge(&mut document, vec![resolved(4, "build.yml", None)]), 0);
        assert!(!document.jobs[0].import.as_ref().unwrap().is_attached());
    }

    #[test]
    fn kind_is_part_of_identity() {
        let mut document = Document::new(Platform::Azure);
        document.jobs.push(job_with_import("build", 4, "build.yml"));

        let mut variables = resolved(4, "build.yml", Some(named("variables")));
        variables.kind = ImportKind::JobVariables;

        assert_eq!(merge(&mut document, vec![variables]), 0);
    }
}
