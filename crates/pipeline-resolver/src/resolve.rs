//! recursive resolution
//!
//! [Resolver] drives the whole engine for one document: scan its import sites, resolve each site to a [Target],
//! fetch and parse it, recurse into the fetched document and finally [merge] the results back. The alias registry,
//! credentials and origin travel down the recursion; siblings never see each other's context.
//!
//! A failing site is recorded in the returned [AggregatedError] and never stops its siblings or ancestors.
use crate::alias::AliasRegistry;
use crate::config::ResolverConfig;
use crate::document::Document;
use crate::error::{AggregatedError, ImportError, SiteFailure};
use crate::fetch::{fetch_local, Credentials, Fetcher, HttpTransport, Transport};
use crate::merge::{merge, ResolvedImport};
use crate::platform::Platform;
use crate::scan::{scan, ImportSite};
use crate::source::{normalize_path, ConcreteSource, SourceDescriptor, SourceKey, Target};
use indexmap::IndexSet;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Repository root that local imports are resolved against
    pub root: PathBuf,
    /// Azure DevOps organization used when a repository declaration does not name one
    pub organization: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("unable to build http client")]
    Http(#[from] reqwest::Error),
    #[error("unable to build fetch thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Where the document currently being resolved came from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    /// The repository on disk
    Local,
    Remote(ConcreteSource),
}

impl Origin {
    fn organization(&self, scm: Platform) -> Option<String> {
        match self {
            Origin::Remote(source) if source.scm == scm => Some(source.organization.clone()),
            _ => None,
        }
    }
}

/// Everything a document's sites see from above
#[derive(Debug, Clone)]
struct Context<'a> {
    platform: Platform,
    registry: AliasRegistry,
    credentials: Option<&'a Credentials>,
    origin: Origin,
    /// Shown in failures
    name: String,
    /// Sources on the current recursion path
    visited: IndexSet<SourceKey>,
}

impl<'a> Context<'a> {
    fn child(&self, target: &Target) -> Context<'a> {
        let mut visited = self.visited.clone();
        visited.insert(target.key());

        Context {
            platform: self.platform,
            registry: self.registry.clone(),
            credentials: self.credentials,
            origin: match target {
                Target::Local(_) => self.origin.clone(),
                Target::Remote(source) => Origin::Remote(source.clone()),
            },
            name: describe(target),
            visited,
        }
    }

    fn cycle(&self, key: &SourceKey) -> Option<String> {
        if !self.visited.contains(key) {
            return None;
        }

        let chain: Vec<_> = self
            .visited
            .iter()
            .chain(std::iter::once(key))
            .map(ToString::to_string)
            .collect();
        Some(chain.join(" -> "))
    }
}

pub struct Resolver<T = HttpTransport> {
    fetcher: Fetcher<T>,
    options: ResolveOptions,
    pool: Option<rayon::ThreadPool>,
}

impl Resolver<HttpTransport> {
    pub fn from_config(config: &ResolverConfig, options: ResolveOptions) -> Result<Self, SetupError> {
        let fetcher = Fetcher::http(config.endpoints.clone(), &config.network)?;
        Resolver::new(fetcher, options).with_parallelism(config.max_parallel_fetches)
    }
}

impl<T: Transport> Resolver<T> {
    /// Sequential resolver
    pub fn new(fetcher: Fetcher<T>, options: ResolveOptions) -> Self {
        Self {
            fetcher,
            options,
            pool: None,
        }
    }

    /// Resolve the sites of each document on a pool of `threads` threads
    ///
    /// `0` and `1` keep resolution sequential.
    pub fn with_parallelism(mut self, threads: usize) -> Result<Self, SetupError> {
        self.pool = match threads {
            0 | 1 => None,
            threads => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("fetch-{index}"))
                    .build()?,
            ),
        };
        Ok(self)
    }

    /// Resolve every import of `document`, recursively
    ///
    /// Returns the merged document and, when at least one site failed, every failure.
    pub fn resolve(
        &self,
        document: Document,
        registry: &AliasRegistry,
        credentials: Option<&Credentials>,
    ) -> (Document, Option<AggregatedError>) {
        let context = Context {
            platform: document.platform,
            registry: registry.clone(),
            credentials,
            origin: Origin::Local,
            name: "<root>".to_string(),
            visited: IndexSet::new(),
        };

        let (document, errors) = self.resolve_document(document, &context);
        (document, errors.into_option())
    }

    /// Load `path` as a `platform` pipeline and resolve it
    ///
    /// Only loading the root file itself can fail, everything below is reported through the [AggregatedError].
    pub fn resolve_file(
        &self,
        path: &Path,
        platform: Platform,
        credentials: Option<&Credentials>,
    ) -> Result<(Document, Option<AggregatedError>), ImportError> {
        let bytes = fetch_local(path)?;
        let document = platform.parse(&bytes)?;

        // same identity a local import of this file would get
        let relative = path.strip_prefix(&self.options.root).unwrap_or(path);
        let target = Target::Local(
            self.options
                .root
                .join(normalize_path(&relative.to_string_lossy())),
        );

        let context = Context {
            platform,
            registry: AliasRegistry::default(),
            credentials,
            origin: Origin::Local,
            name: path.display().to_string(),
            visited: IndexSet::from([target.key()]),
        };

        let (document, errors) = self.resolve_document(document, &context);
        Ok((document, errors.into_option()))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(document = %inherited.name))]
    fn resolve_document(&self, mut document: Document, inherited: &Context) -> (Document, AggregatedError) {
        let mut errors = AggregatedError::new();

        let sites = scan(&document);
        if sites.is_empty() {
            return (document, errors);
        }

        let context = Context {
            registry: AliasRegistry::merge(&inherited.registry, &document.defaults.resources),
            ..inherited.clone()
        };

        // collected in site order regardless of completion order
        let outcomes: Vec<_> = match &self.pool {
            Some(pool) => pool.install(|| {
                sites
                    .par_iter()
                    .map(|site| self.resolve_site(site, &context))
                    .collect()
            }),
            None => sites
                .iter()
                .map(|site| self.resolve_site(site, &context))
                .collect(),
        };

        let mut resolved = vec![];
        for (import, site_errors) in outcomes {
            resolved.extend(import);
            errors.append(site_errors);
        }

        let attached = merge(&mut document, resolved);
        tracing::debug!(sites = sites.len(), attached, failed = errors.len(), "document resolved");

        (document, errors)
    }

    fn resolve_site(&self, site: &ImportSite, context: &Context) -> (Option<ResolvedImport>, AggregatedError) {
        let mut errors = AggregatedError::new();

        let Some(target) = self.target(&site.descriptor, context) else {
            tracing::trace!(kind = %site.kind, key = %site.key, "unresolvable import, skipping");
            return (None, errors);
        };

        if let Some(chain) = context.cycle(&target.key()) {
            errors.log(failure(site, context, ImportError::CycleDetected { chain }));
            return (Some(unresolved(site, None)), errors);
        }

        let content = match self.fetcher.fetch(&target, context.credentials) {
            Ok(Some(content)) => content,
            Ok(None) => {
                tracing::trace!(kind = %site.kind, key = %site.key, "no content, skipping");
                return (None, errors);
            }
            Err(error) => {
                errors.log(failure(site, context, error));
                return (Some(unresolved(site, None)), errors);
            }
        };

        let sub_document = match context.platform.parse(&content) {
            Ok(sub_document) => sub_document,
            Err(error) => {
                errors.log(failure(site, context, error.into()));
                return (Some(unresolved(site, Some(content))), errors);
            }
        };

        let (sub_document, sub_errors) = self.resolve_document(sub_document, &context.child(&target));
        errors.append(sub_errors);

        tracing::debug!(kind = %site.kind, key = %site.key, location = %site.location, "import resolved");
        let resolved = ResolvedImport {
            kind: site.kind,
            location: site.location,
            key: site.key.clone(),
            content: Some(content),
            document: Some(sub_document),
        };
        (Some(resolved), errors)
    }

    /// Where a descriptor points from within `context`, `None` when it cannot be resolved
    fn target(&self, descriptor: &SourceDescriptor, context: &Context) -> Option<Target> {
        let target = match descriptor {
            SourceDescriptor::Local { path } => match &context.origin {
                Origin::Local => Target::Local(self.options.root.join(normalize_path(path))),
                Origin::Remote(source) => Target::Remote(source.sibling(path)),
            },
            SourceDescriptor::Root { path } => {
                Target::Local(self.options.root.join(normalize_path(path)))
            }
            SourceDescriptor::Remote {
                scm,
                path,
                alias: Some(alias),
                ..
            } => {
                let declaration = context.registry.lookup(alias, *scm)?;
                let organization = declaration
                    .organization
                    .clone()
                    .or_else(|| self.options.organization.clone())
                    .or_else(|| context.origin.organization(*scm))
                    .unwrap_or_default();

                Target::Remote(ConcreteSource {
                    scm: *scm,
                    organization,
                    project: declaration.project.clone(),
                    repository: declaration.repository.clone(),
                    path: normalize_path(path),
                    reference: declaration.reference.clone(),
                })
            }
            SourceDescriptor::Remote {
                scm,
                organization,
                repository,
                path,
                alias: None,
                reference,
            } => Target::Remote(ConcreteSource {
                scm: *scm,
                organization: organization.clone().unwrap_or_default(),
                project: None,
                repository: repository.clone().unwrap_or_default(),
                path: normalize_path(path),
                reference: reference.clone(),
            }),
            SourceDescriptor::Unsupported { .. } => return None,
        };

        Some(target)
    }
}

fn describe(target: &Target) -> String {
    match target {
        Target::Local(path) => path.display().to_string(),
        Target::Remote(_) => target.key().to_string(),
    }
}

fn failure(site: &ImportSite, context: &Context, error: ImportError) -> SiteFailure {
    SiteFailure::new(
        site.kind,
        site.key.clone(),
        site.location,
        context.name.clone(),
        error,
    )
}

fn unresolved(site: &ImportSite, content: Option<Vec<u8>>) -> ResolvedImport {
    ResolvedImport {
        kind: site.kind,
        location: site.location,
        key: site.key.clone(),
        content,
        document: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alias::ResourceDeclaration;
    use crate::config::EndpointConfig;
    use crate::fetch::{FetchError, Response};
    use pretty_assertions::assert_eq;

    struct Unreachable;

    impl Transport for Unreachable {
        fn get(&self, url: &str, _: &[(String, String)]) -> Result<Response, FetchError> {
            panic!("unexpected request to {url}")
        }
    }

    fn resolver(organization: Option<&str>) -> Resolver<Unreachable> {
        Resolver::new(
            Fetcher::new(EndpointConfig::default(), Unreachable),
            ResolveOptions {
                root: PathBuf::from("/repo"),
                organization: organization.map(str::to_string),
            },
        )
    }

    fn context(origin: Origin) -> Context<'static> {
        Context {
            platform: Platform::Azure,
            registry: AliasRegistry::new([ResourceDeclaration {
                alias: "templates".into(),
                scm: Platform::Azure,
                organization: None,
                project: Some("infra".into()),
                repository: "pipeline-templates".into(),
                reference: Some("v1".into()),
            }]),
            credentials: None,
            origin,
            name: "ci.yml".into(),
            visited: IndexSet::new(),
        }
    }

    fn template_source(path: &str) -> ConcreteSource {
        ConcreteSource {
            scm: Platform::Azure,
            organization: "acme".into(),
            project: Some("infra".into()),
            repository: "pipeline-templates".into(),
            path: path.into(),
            reference: Some("v1".into()),
        }
    }

    #[test]
    fn local_paths_are_root_relative() {
        let target = resolver(None).target(
            &SourceDescriptor::local("./templates/build.yml"),
            &context(Origin::Local),
        );
        assert_eq!(
            target,
            Some(Target::Local(PathBuf::from("/repo/templates/build.yml")))
        );
    }

    #[test]
    fn alias_uses_configured_organization() {
        let target = resolver(Some("acme")).target(
            &SourceDescriptor::aliased(Platform::Azure, "templates", "/jobs/build.yml"),
            &context(Origin::Local),
        );
        assert_eq!(target, Some(Target::Remote(template_source("jobs/build.yml"))));
    }

    #[test]
    fn unknown_alias_is_unresolvable() {
        let target = resolver(Some("acme")).target(
            &SourceDescriptor::aliased(Platform::Azure, "missing", "jobs/build.yml"),
            &context(Origin::Local),
        );
        assert_eq!(target, None);
    }

    #[test]
    fn local_import_of_remote_document_stays_in_its_repository() {
        let origin = Origin::Remote(template_source("jobs/build.yml"));
        let target = resolver(None).target(&SourceDescriptor::local("steps/test.yml"), &context(origin));
        assert_eq!(target, Some(Target::Remote(template_source("steps/test.yml"))));
    }

    #[test]
    fn root_repository_import_of_remote_document_is_local() {
        let origin = Origin::Remote(template_source("jobs/build.yml"));
        let target = resolver(None).target(
            &SourceDescriptor::Root {
                path: "vars/common.yml".into(),
            },
            &context(origin),
        );
        assert_eq!(
            target,
            Some(Target::Local(PathBuf::from("/repo/vars/common.yml")))
        );
    }

    #[test]
    fn organization_is_inherited_from_remote_origin() {
        let origin = Origin::Remote(template_source("jobs/build.yml"));
        let target = resolver(None).target(
            &SourceDescriptor::aliased(Platform::Azure, "templates", "steps/test.yml"),
            &context(origin),
        );
        assert_eq!(target, Some(Target::Remote(template_source("steps/test.yml"))));
    }

    #[test]
    fn cycles_report_the_whole_chain() {
        let mut context = context(Origin::Local);
        let root = Target::Local(PathBuf::from("/repo/a.yml")).key();
        let child = Target::Local(PathBuf::from("/repo/b.yml")).key();
        context.visited.insert(root.clone());
        context.visited.insert(child);

        assert_eq!(
            context.cycle(&root).as_deref(),
            Some("local:/repo/a.yml -> local:/repo/b.yml -> local:/repo/a.yml")
        );
        assert_eq!(context.cycle(&SourceKey::new("local:/repo/c.yml")), None);
    }

    #[test]
    fn unsupported_declarations_are_never_fetched() {
        let mut document = Document::new(Platform::GitLab);
        document.defaults.imports.push(crate::document::Import::new(
            crate::location::SourceLocation::line(2, 5, 40),
            "https://example.com/ci.yml".into(),
            SourceDescriptor::Unsupported {
                declaration: "https://example.com/ci.yml".into(),
            },
        ));

        let (resolved, errors) = resolver(None).resolve(document.clone(), &AliasRegistry::default(), None);
        assert_eq!(resolved, document);
        assert!(errors.is_none());
    }
}
