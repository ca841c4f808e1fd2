//! platform-neutral shape of one pipeline file
//!
//! Loaders produce a [Document] per file. The engine reads the import declarations ([Import]) and the resource
//! declarations, and writes exactly one field: [Import::pipeline], the resolved sub-document.
use crate::alias::ResourceDeclaration;
use crate::location::SourceLocation;
use crate::platform::Platform;
use crate::source::SourceDescriptor;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<Import>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Job>,
}

impl Document {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            name: None,
            defaults: Default::default(),
            extends: None,
            jobs: Default::default(),
        }
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }
}

/// Document-wide settings: repository aliases and imported variable/include files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Defaults {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceDeclaration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
}

impl Defaults {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.imports.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, derive_new::new)]
pub struct Job {
    pub id: String,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub location: SourceLocation,
    /// The whole job comes from another file (reusable workflow, job template)
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<Import>,
    /// Templates of the job's `variables` block
    #[new(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables_imports: Vec<Import>,
    #[new(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_steps: Vec<Step>,
    #[new(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[new(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, derive_new::new)]
pub struct Step {
    pub location: SourceLocation,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<Import>,
    #[new(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables_imports: Vec<Import>,
}

/// One declaration that pulls in another pipeline file
#[derive(Debug, Clone, PartialEq, Serialize, derive_new::new)]
pub struct Import {
    pub location: SourceLocation,
    /// The declaration as written, e.g. `jobs/build.yml@templates`
    pub key: String,
    pub source: SourceDescriptor,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_yaml::Value>,
    /// Attached once the import has been resolved
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Box<Document>>,
}

impl Import {
    pub fn with_parameters(mut self, parameters: Option<serde_yaml::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn is_attached(&self) -> bool {
        self.pipeline.is_some()
    }
}

/// Which slot of a [Document] an import declaration occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `defaults.imports[]`
    Defaults,
    /// `extends`
    Extends,
    /// `jobs[].import`
    Job,
    /// `jobs[].variables_imports[]`
    JobVariables,
    /// `import` of a pre-, main or post-step
    Step,
    /// `variables_imports[]` of a pre-, main or post-step
    StepVariables,
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportKind::Defaults => f.write_str("defaults"),
            ImportKind::Extends => f.write_str("extends"),
            ImportKind::Job => f.write_str("job"),
            ImportKind::JobVariables => f.write_str("job_variables"),
            ImportKind::Step => f.write_str("step"),
            ImportKind::StepVariables => f.write_str("step_variables"),
        }
    }
}
