//! bitbucket pipelines
//!
//! Bitbucket has no way to import another pipeline file. Steps are loaded as jobs so the document is complete, but
//! a bitbucket document never has import sites.
use super::{items, locate_entry, read, string, strings, LoadError};
use crate::document::{Document, Job, Step};
use crate::location::Locator;
use crate::platform::Platform;
use serde_yaml::Value;

pub fn load(bytes: &[u8]) -> Result<Document, LoadError> {
    let (text, root) = read(bytes, Platform::Bitbucket)?;
    let mut locator = Locator::new(text);

    let mut document = Document::new(Platform::Bitbucket);
    let Some(pipelines) = root.get("pipelines").and_then(Value::as_mapping) else {
        return Ok(document);
    };
    let pipelines_line = locator.find_top_level("pipelines").unwrap_or_default();

    for (trigger, definition) in pipelines {
        let Some(trigger) = trigger.as_str() else {
            continue;
        };

        // `default` is a list of steps, the other triggers map a pattern to a list of steps
        let groups: Vec<(String, &Value)> = match definition {
            Value::Sequence(_) => vec![(trigger.to_string(), definition)],
            Value::Mapping(patterns) => patterns
                .iter()
                .filter_map(|(pattern, steps)| {
                    pattern
                        .as_str()
                        .map(|pattern| (format!("{trigger}/{pattern}"), steps))
                })
                .collect(),
            _ => continue,
        };

        for (pipeline, steps) in groups {
            for (index, entry) in flatten(items(Some(steps))).into_iter().enumerate() {
                let mut job = Job::new(
                    format!("{pipeline}/{index}"),
                    locate_entry(&mut locator, entry, pipelines_line),
                );
                job.name = string(entry.get("name"));
                job.steps = strings(entry.get("script"))
                    .into_iter()
                    .map(|line| {
                        let mut step = Step::new(job.location);
                        step.run = Some(line.to_string());
                        step
                    })
                    .collect();
                document.jobs.push(job);
            }
        }
    }

    Ok(document)
}

/// `step` bodies, including those nested in `parallel` blocks
fn flatten(entries: &[Value]) -> Vec<&serde_yaml::Mapping> {
    let mut steps = vec![];
    for entry in entries {
        if let Some(step) = entry.get("step").and_then(Value::as_mapping) {
            steps.push(step);
        }

        let parallel = entry.get("parallel");
        let nested = parallel
            .and_then(|parallel| parallel.get("steps"))
            .or(parallel);
        if nested.is_some() {
            steps.extend(flatten(items(nested)));
        }
    }
    steps
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::scan;
    use pretty_assertions::assert_eq;

    const PIPELINE: &str = r#"pipelines:
  default:
    - step:
        name: build
        script:
          - cargo build
    - parallel:
        - step:
            name: lint
            script:
              - cargo clippy
        - step:
            name: test
            script:
              - cargo test
  branches:
    main:
      - step:
          name: deploy
          script:
            - ./deploy.sh
"#;

    #[test]
    fn steps_become_jobs() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        let ids: Vec<_> = document.jobs.iter().map(|job| job.id.as_str()).collect();
        assert_eq!(ids, vec!["default/0", "default/1", "default/2", "branches/main/0"]);
        assert_eq!(document.jobs[2].name.as_deref(), Some("test"));
        assert_eq!(document.jobs[3].steps[0].run.as_deref(), Some("./deploy.sh"));
    }

    #[test]
    fn never_has_import_sites() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        assert!(scan(&document).is_empty());
    }
}
