//! gitlab ci
//!
//! Files are pulled in document-wide through `include`. Project includes (`project`, `file`, `ref`) are fetched
//! through the repository files api; `remote` urls, built-in `template`s and `component`s are recorded but not
//! fetched.
use super::{items, read, strings, LoadError};
use crate::document::{Document, Import, Job, Step};
use crate::location::{Locator, SourceLocation};
use crate::platform::Platform;
use crate::source::SourceDescriptor;
use serde_yaml::{Mapping, Value};

/// Top-level keys that are not jobs
const RESERVED: &[&str] = &[
    "default",
    "include",
    "stages",
    "types",
    "variables",
    "workflow",
    "image",
    "services",
    "cache",
    "before_script",
    "after_script",
];

pub fn load(bytes: &[u8]) -> Result<Document, LoadError> {
    let (text, root) = read(bytes, Platform::GitLab)?;
    let mut locator = Locator::new(text);

    let mut document = Document::new(Platform::GitLab);

    if let Some(line) = locator.find_top_level("include") {
        document.defaults.imports = includes(&mut locator, root.get("include"), line);
    }

    for (id, body) in &root {
        let Some(id) = id.as_str() else {
            continue;
        };

        // hidden jobs only exist to be extended
        if RESERVED.contains(&id) || id.starts_with('.') {
            continue;
        }

        let Some(body) = body.as_mapping() else {
            continue;
        };

        let line = locator.find_top_level(id).unwrap_or_default();
        let mut job = Job::new(id.to_string(), SourceLocation::line(line, 1, id.len() + 2));
        job.stage = body.get("stage").and_then(Value::as_str).map(str::to_string);
        job.pre_steps = script(body, "before_script", job.location);
        job.steps = script(body, "script", job.location);
        job.post_steps = script(body, "after_script", job.location);
        document.jobs.push(job);
    }

    Ok(document)
}

fn script(body: &Mapping, key: &str, location: SourceLocation) -> Vec<Step> {
    strings(body.get(key))
        .into_iter()
        .map(|line| {
            let mut step = Step::new(location);
            step.run = Some(line.to_string());
            step
        })
        .collect()
}

fn includes(locator: &mut Locator, block: Option<&Value>, after: usize) -> Vec<Import> {
    let entries: Vec<&Value> = match block {
        Some(Value::Sequence(_)) => items(block).iter().collect(),
        Some(single) => vec![single],
        None => vec![],
    };

    let mut imports = vec![];
    for entry in entries {
        match entry {
            Value::String(path) => {
                let location = match locator.find("include", Some(path), after - 1) {
                    location if location.start_line != 0 => location,
                    _ => locator.find_item(path, after),
                };
                imports.push(Import::new(location, path.clone(), shorthand(path)));
            }
            Value::Mapping(include) => imports.extend(include_mapping(locator, include, after)),
            _ => tracing::debug!("unsupported include entry"),
        }
    }
    imports
}

/// `include: path` or `- path`: urls are remote includes, everything else a local file
fn shorthand(path: &str) -> SourceDescriptor {
    if path.starts_with("https://") || path.starts_with("http://") {
        SourceDescriptor::Unsupported {
            declaration: path.to_string(),
        }
    } else {
        SourceDescriptor::local(path)
    }
}

fn include_mapping(locator: &mut Locator, include: &Mapping, after: usize) -> Vec<Import> {
    let field = |key: &str| include.get(key).and_then(Value::as_str);

    if let Some(path) = field("local") {
        let location = locator.find("local", Some(path), after);
        return vec![Import::new(location, path.to_string(), SourceDescriptor::local(path))];
    }

    if let Some(project) = field("project") {
        let project_line = locator.find("project", Some(project), after).start_line;
        let (organization, repository) = match project.rsplit_once('/') {
            Some((group, name)) => (Some(group.to_string()), Some(name.to_string())),
            None => (None, Some(project.to_string())),
        };
        let reference = field("ref").map(str::to_string);
        let inline = include.get("file").map(Value::is_string).unwrap_or(false);

        return strings(include.get("file"))
            .into_iter()
            .map(|file| {
                let location = if inline {
                    locator.find("file", Some(file), project_line)
                } else {
                    locator.find_item(file, project_line)
                };
                let source = SourceDescriptor::Remote {
                    scm: Platform::GitLab,
                    organization: organization.clone(),
                    repository: repository.clone(),
                    path: file.to_string(),
                    alias: None,
                    reference: reference.clone(),
                };
                Import::new(location, file.to_string(), source)
            })
            .collect();
    }

    for key in ["remote", "template", "component"] {
        if let Some(declaration) = field(key) {
            let location = locator.find(key, Some(declaration), after);
            let source = SourceDescriptor::Unsupported {
                declaration: declaration.to_string(),
            };
            return vec![Import::new(location, declaration.to_string(), source)];
        }
    }

    tracing::debug!("include without a known source key");
    vec![]
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const PIPELINE: &str = r#"include:
  - local: /ci/common.yml
  - project: acme/platform/ci-templates
    ref: v3
    file:
      - /build.yml
      - /test.yml
  - remote: https://example.com/ci.yml
  - ci/extra.yml
stages: [build]
.hidden:
  script: echo hidden
build:
  stage: build
  before_script: echo setup
  script:
    - cargo build
    - cargo test
"#;

    #[test]
    fn includes_are_defaults_imports() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        let imports: Vec<_> = document
            .defaults
            .imports
            .iter()
            .map(|import| (import.key.as_str(), import.location.start_line))
            .collect();

        assert_eq!(
            imports,
            vec![
                ("/ci/common.yml", 2),
                ("/build.yml", 6),
                ("/test.yml", 7),
                ("https://example.com/ci.yml", 8),
                ("ci/extra.yml", 9),
            ]
        );

        assert_eq!(
            document.defaults.imports[2].source,
            SourceDescriptor::Remote {
                scm: Platform::GitLab,
                organization: Some("acme/platform".into()),
                repository: Some("ci-templates".into()),
                path: "/test.yml".into(),
                alias: None,
                reference: Some("v3".into()),
            }
        );
        assert!(matches!(
            document.defaults.imports[3].source,
            SourceDescriptor::Unsupported { .. }
        ));
    }

    #[test]
    fn jobs_and_scripts() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        assert_eq!(document.jobs.len(), 1);

        let build = &document.jobs[0];
        assert_eq!(build.id, "build");
        assert_eq!(build.location.start_line, 13);
        assert_eq!(build.pre_steps.len(), 1);
        assert_eq!(build.steps.len(), 2);
        assert_eq!(build.steps[1].run.as_deref(), Some("cargo test"));
    }

    #[test]
    fn single_string_include() {
        let document = load(b"include: 'ci/base.yml'\n").unwrap();
        assert_eq!(document.defaults.imports.len(), 1);
        assert_eq!(document.defaults.imports[0].location.start_line, 1);
        assert_eq!(
            document.defaults.imports[0].source,
            SourceDescriptor::local("ci/base.yml")
        );
    }
}
