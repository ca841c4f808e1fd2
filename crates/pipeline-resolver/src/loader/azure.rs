//! azure pipelines
//!
//! Templates can be pulled in at every level: `variables`, `extends`, stages, jobs and steps. A template reference
//! is `path`, `path@self` or `path@alias` where the alias is declared under `resources.repositories`.
use super::{items, locate_entry, read, string, LoadError};
use crate::alias::ResourceDeclaration;
use crate::document::{Document, Import, Job, Step};
use crate::location::Locator;
use crate::platform::Platform;
use crate::source::{short_ref, SourceDescriptor};
use serde_yaml::{Mapping, Value};

pub fn load(bytes: &[u8]) -> Result<Document, LoadError> {
    let (text, root) = read(bytes, Platform::Azure)?;
    let mut locator = Locator::new(text);

    let mut document = Document::new(Platform::Azure);
    document.name = string(root.get("name"));
    document.defaults.resources = resources(&root);

    if let Some(line) = locator.find_top_level("variables") {
        document.defaults.imports = variables(&mut locator, root.get("variables"), line);
    }

    if let Some(extends) = root.get("extends") {
        let line = locator.find_top_level("extends").unwrap_or_default();
        document.extends = template(&mut locator, extends, line);
    }

    if let Some(line) = locator.find_top_level("stages") {
        for stage in items(root.get("stages")) {
            let Some(stage) = stage.as_mapping() else {
                continue;
            };

            if stage.contains_key("template") {
                document.jobs.extend(template_job(&mut locator, stage, line));
                continue;
            }

            let name = string(stage.get("stage"));
            let stage_line = locator.find("stage", name.as_deref(), line).start_line;

            // stages have no import slot of their own
            let stage_templates = items(stage.get("variables"))
                .iter()
                .filter_map(|entry| entry.get("template")?.as_str());
            for template in stage_templates {
                tracing::debug!(stage = ?name, template, "stage variables template is not imported");
            }

            for mut job in jobs(&mut locator, stage.get("jobs"), stage_line) {
                job.stage = name.clone();
                document.jobs.push(job);
            }
        }
    }

    if let Some(line) = locator.find_top_level("jobs") {
        document.jobs.extend(jobs(&mut locator, root.get("jobs"), line));
    }

    if let Some(line) = locator.find_top_level("steps") {
        let mut job = Job::new("default".to_string(), Default::default());
        job.location.start_line = line;
        job.location.end_line = line;
        job.steps = steps(&mut locator, root.get("steps"), line);
        document.jobs.push(job);
    }

    Ok(document)
}

/// `resources.repositories`
fn resources(root: &Mapping) -> Vec<ResourceDeclaration> {
    let repositories = root
        .get("resources")
        .and_then(|resources| resources.get("repositories"));

    items(repositories)
        .iter()
        .filter_map(|repository| {
            let alias = repository.get("repository")?.as_str()?;
            let name = repository.get("name")?.as_str()?;
            let scm = match repository.get("type").and_then(Value::as_str) {
                Some("git") | None => Platform::Azure,
                Some("github") | Some("githubenterprise") => Platform::GitHub,
                Some("bitbucket") => Platform::Bitbucket,
                Some(other) => {
                    tracing::debug!(alias, scm = other, "unknown repository type");
                    return None;
                }
            };

            let (namespace, repository_name) = match name.split_once('/') {
                Some((namespace, repository_name)) => (Some(namespace.to_string()), repository_name),
                None => (None, name),
            };

            // azure names are `project/repo` inside the pipeline's organization, others `owner/repo`
            let (organization, project) = match scm {
                Platform::Azure => (None, namespace),
                _ => (namespace, None),
            };

            Some(ResourceDeclaration {
                alias: alias.to_string(),
                scm,
                organization,
                project,
                repository: repository_name.to_string(),
                reference: string(repository.get("ref")).map(|r| short_ref(&r).to_string()),
            })
        })
        .collect()
}

/// Template references of a `variables` block; plain name/value pairs and groups are ignored
fn variables(locator: &mut Locator, block: Option<&Value>, after: usize) -> Vec<Import> {
    items(block)
        .iter()
        .filter(|entry| entry.get("template").is_some())
        .filter_map(|entry| template(locator, entry, after))
        .collect()
}

fn jobs(locator: &mut Locator, block: Option<&Value>, after: usize) -> Vec<Job> {
    let mut jobs = vec![];
    for entry in items(block) {
        let Some(entry) = entry.as_mapping() else {
            continue;
        };

        if entry.contains_key("template") {
            jobs.extend(template_job(locator, entry, after));
            continue;
        }

        let (key, id) = match (string(entry.get("job")), string(entry.get("deployment"))) {
            (Some(id), _) => ("job", id),
            (None, Some(id)) => ("deployment", id),
            (None, None) => {
                tracing::debug!("job without identifier, skipping");
                continue;
            }
        };

        let mut job = Job::new(id.clone(), locator.find(key, Some(&id), after));
        job.name = string(entry.get("displayName"));
        let line = job.location.start_line;

        job.variables_imports = variables(locator, entry.get("variables"), line);
        job.steps = steps(locator, entry.get("steps"), line);

        // deployment jobs: strategy.<runOnce|rolling|canary>.<hook>.steps
        let strategy = entry
            .get("strategy")
            .and_then(Value::as_mapping)
            .and_then(|strategy| strategy.values().next());
        if let Some(strategy) = strategy {
            let hook = |name: &str| strategy.get(name).and_then(|hook| hook.get("steps"));
            let lifecycle = |name: &str| {
                strategy
                    .get("on")
                    .and_then(|on| on.get(name))
                    .and_then(|hook| hook.get("steps"))
            };

            job.pre_steps = steps(locator, hook("preDeploy"), line);
            job.steps.extend(steps(locator, hook("deploy"), line));
            job.steps.extend(steps(locator, hook("routeTraffic"), line));
            job.post_steps = steps(locator, hook("postRouteTraffic"), line);
            job.post_steps.extend(steps(locator, lifecycle("success"), line));
            job.post_steps.extend(steps(locator, lifecycle("failure"), line));
        }

        jobs.push(job);
    }
    jobs
}

/// A stage or job entry that is entirely a template
fn template_job(locator: &mut Locator, entry: &Mapping, after: usize) -> Option<Job> {
    let import = template(locator, &Value::Mapping(entry.clone()), after)?;
    let mut job = Job::new(import.key.clone(), import.location);
    job.import = Some(import);
    Some(job)
}

fn steps(locator: &mut Locator, block: Option<&Value>, after: usize) -> Vec<Step> {
    let mut steps = vec![];
    for entry in items(block) {
        let Some(mapping) = entry.as_mapping() else {
            continue;
        };

        if mapping.contains_key("template") {
            if let Some(import) = template(locator, entry, after) {
                let mut step = Step::new(import.location);
                step.import = Some(import);
                steps.push(step);
            }
            continue;
        }

        let mut step = Step::new(locate_entry(locator, mapping, after));
        step.name = string(mapping.get("displayName")).or_else(|| string(mapping.get("task")));
        step.run = ["script", "bash", "pwsh", "powershell"]
            .iter()
            .find_map(|key| string(mapping.get(*key)));
        step.variables_imports = variables(locator, mapping.get("variables"), step.location.start_line);
        steps.push(step);
    }
    steps
}

/// `{ template: reference, parameters: ... }`
fn template(locator: &mut Locator, entry: &Value, after: usize) -> Option<Import> {
    let reference = entry.get("template")?.as_str()?;
    let location = locator.find("template", Some(reference), after);
    Some(
        Import::new(location, reference.to_string(), descriptor(reference))
            .with_parameters(entry.get("parameters").cloned()),
    )
}

/// `path`, `path@self` or `path@alias`
///
/// `@self` is the repository of the pipeline that started the run, also when written inside a template from
/// another repository.
pub fn descriptor(reference: &str) -> SourceDescriptor {
    match reference.rsplit_once('@') {
        Some((path, "self")) => SourceDescriptor::Root {
            path: path.to_string(),
        },
        Some((path, alias)) => SourceDescriptor::aliased(Platform::Azure, alias, path),
        None => SourceDescriptor::local(reference),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::ImportKind;
    use crate::scan::scan;
    use pretty_assertions::assert_eq;

    const PIPELINE: &str = r#"resources:
  repositories:
    - repository: templates
      type: git
      name: infra/pipeline-templates
      ref: refs/tags/v1.4
    - repository: actions
      type: github
      name: acme/actions
variables:
  - name: configuration
    value: release
  - template: vars/common.yml
extends:
  template: base.yml@templates
  parameters:
    pool: linux
stages:
  - stage: build
    jobs:
      - job: compile
        variables:
          - template: vars/compile.yml
        steps:
          - script: cargo build
          - template: steps/test.yml@templates
  - template: stages/deploy.yml
jobs:
  - deployment: release
    strategy:
      runOnce:
        preDeploy:
          steps:
            - template: steps/common.yml
        deploy:
          steps:
            - template: steps/common.yml
"#;

    #[test]
    fn resource_declarations() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        assert_eq!(
            document.defaults.resources,
            vec![
                ResourceDeclaration {
                    alias: "templates".into(),
                    scm: Platform::Azure,
                    organization: None,
                    project: Some("infra".into()),
                    repository: "pipeline-templates".into(),
                    reference: Some("v1.4".into()),
                },
                ResourceDeclaration {
                    alias: "actions".into(),
                    scm: Platform::GitHub,
                    organization: Some("acme".into()),
                    project: None,
                    repository: "actions".into(),
                    reference: None,
                },
            ]
        );
    }

    #[test]
    fn imports_at_every_level() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        let sites: Vec<_> = scan(&document)
            .into_iter()
            .map(|site| (site.kind, site.key, site.location.start_line))
            .collect();

        assert_eq!(
            sites,
            vec![
                (ImportKind::Defaults, "vars/common.yml".to_string(), 13),
                (ImportKind::Extends, "base.yml@templates".to_string(), 15),
                (ImportKind::JobVariables, "vars/compile.yml".to_string(), 23),
                (ImportKind::Step, "steps/test.yml@templates".to_string(), 26),
                (ImportKind::Job, "stages/deploy.yml".to_string(), 27),
                (ImportKind::Step, "steps/common.yml".to_string(), 34),
                (ImportKind::Step, "steps/common.yml".to_string(), 37),
            ]
        );
    }

    #[test]
    fn stage_names_are_kept() {
        let document = load(PIPELINE.as_bytes()).unwrap();
        let compile = document.job("compile").unwrap();
        assert_eq!(compile.stage.as_deref(), Some("build"));
        assert_eq!(compile.steps[0].run.as_deref(), Some("cargo build"));

        let release = document.job("release").unwrap();
        assert_eq!(release.pre_steps.len(), 1);
        assert_eq!(release.steps.len(), 1);
    }

    #[test]
    fn template_references() {
        assert_eq!(
            descriptor("a.yml@self"),
            SourceDescriptor::Root {
                path: "a.yml".into()
            }
        );
        assert_eq!(descriptor("a.yml"), SourceDescriptor::local("a.yml"));
        assert_eq!(
            descriptor("jobs/a.yml@templates"),
            SourceDescriptor::aliased(Platform::Azure, "templates", "jobs/a.yml")
        );
    }

    #[test]
    fn every_variables_template_is_an_import() {
        const JOBS: &str = r#"jobs:
  - job: build
    variables:
      - template: vars/a.yml
      - name: configuration
        value: release
      - template: vars/b.yml
    steps:
      - script: cargo build
        variables:
          - template: vars/c.yml
          - template: vars/d.yml
"#;
        let document = load(JOBS.as_bytes()).unwrap();
        let sites: Vec<_> = scan(&document)
            .into_iter()
            .map(|site| (site.kind, site.key, site.location.start_line))
            .collect();

        assert_eq!(
            sites,
            vec![
                (ImportKind::JobVariables, "vars/a.yml".to_string(), 4),
                (ImportKind::JobVariables, "vars/b.yml".to_string(), 7),
                (ImportKind::StepVariables, "vars/c.yml".to_string(), 11),
                (ImportKind::StepVariables, "vars/d.yml".to_string(), 12),
            ]
        );
    }

    #[test]
    fn stage_variables_templates_are_not_imported() {
        const STAGES: &str = r#"stages:
  - stage: build
    variables:
      - template: vars/stage.yml
    jobs:
      - job: compile
        steps:
          - template: steps/build.yml
"#;
        let document = load(STAGES.as_bytes()).unwrap();
        let keys: Vec<_> = scan(&document).into_iter().map(|site| site.key).collect();
        assert_eq!(keys, vec!["steps/build.yml"]);
        assert_eq!(document.job("compile").unwrap().stage.as_deref(), Some("build"));
    }

    #[test]
    fn top_level_steps_become_a_default_job() {
        let document = load(b"steps:\n  - template: a.yml\n  - bash: echo hi\n").unwrap();
        assert_eq!(document.jobs.len(), 1);
        assert_eq!(document.jobs[0].id, "default");
        assert_eq!(document.jobs[0].steps.len(), 2);
        assert_eq!(document.jobs[0].steps[1].run.as_deref(), Some("echo hi"));
    }
}
