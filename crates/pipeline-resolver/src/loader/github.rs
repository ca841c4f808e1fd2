//! github actions workflows
//!
//! Only jobs can import: `jobs.<id>.uses` calls a reusable workflow, either `./path` in the same repository or
//! `owner/repo/path@ref`. Step-level `uses` refer to actions and are not pipeline imports.
use super::{items, locate_entry, read, string, LoadError};
use crate::document::{Document, Import, Job, Step};
use crate::location::Locator;
use crate::platform::Platform;
use crate::source::SourceDescriptor;
use serde_yaml::Value;

pub fn load(bytes: &[u8]) -> Result<Document, LoadError> {
    let (text, root) = read(bytes, Platform::GitHub)?;
    let mut locator = Locator::new(text);

    let mut document = Document::new(Platform::GitHub);
    document.name = string(root.get("name"));

    let jobs_line = locator.find_top_level("jobs").unwrap_or_default();
    let Some(jobs) = root.get("jobs").and_then(Value::as_mapping) else {
        return Ok(document);
    };

    for (id, body) in jobs {
        let Some(id) = id.as_str() else {
            continue;
        };

        let mut job = Job::new(id.to_string(), locator.find(id, None, jobs_line));
        job.name = string(body.get("name"));

        if let Some(uses) = body.get("uses").and_then(Value::as_str) {
            let location = locator.find("uses", Some(uses), job.location.start_line);
            job.import = Some(
                Import::new(location, uses.to_string(), descriptor(uses))
                    .with_parameters(body.get("with").cloned()),
            );
        }

        for step in items(body.get("steps")) {
            let Some(entry) = step.as_mapping() else {
                continue;
            };

            let mut step = Step::new(locate_entry(&mut locator, entry, job.location.start_line));
            step.name = string(entry.get("name")).or_else(|| string(entry.get("uses")));
            step.run = string(entry.get("run"));
            job.steps.push(step);
        }

        document.jobs.push(job);
    }

    Ok(document)
}

/// `./local/path.yml` or `owner/repo/path/to/workflow.yml@ref`
pub fn descriptor(uses: &str) -> SourceDescriptor {
    if uses.starts_with("./") {
        return SourceDescriptor::local(uses);
    }

    let (path, reference) = match uses.rsplit_once('@') {
        Some((path, reference)) => (path, Some(reference.to_string())),
        None => (uses, None),
    };

    let mut segments = path.splitn(3, '/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(owner), Some(repository), Some(path))
            if !owner.is_empty() && !repository.is_empty() && !path.is_empty() =>
        {
            SourceDescriptor::Remote {
                scm: Platform::GitHub,
                organization: Some(owner.to_string()),
                repository: Some(repository.to_string()),
                path: path.to_string(),
                alias: None,
                reference,
            }
        }
        _ => SourceDescriptor::Unsupported {
            declaration: uses.to_string(),
        },
    }
}
