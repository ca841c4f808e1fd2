//! # pipeline-resolver - cross-file import resolution for CI pipelines
//!
//! ## Introduction for developers
//!
//! Read this to understand how `pipeline-resolver` works internally.
//!
//! ### Imports
//!
//! Every supported CI dialect has some way for one pipeline file to pull in another:
//!
//! | platform  | declaration                                   | lands in                     |
//! |-----------|-----------------------------------------------|------------------------------|
//! | github    | `jobs.<id>.uses: owner/repo/path@ref`         | [document::Job::import]      |
//! | azure     | `- template: path@alias` (variables, extends, stages, jobs, steps) | every slot  |
//! | gitlab    | `include:` (`local`, `project`/`file`/`ref`)  | [document::Defaults::imports] |
//! | bitbucket | none                                          |                              |
//!
//! Such a declaration is an *import site*. Its target is described by a [source::SourceDescriptor], which may only
//! name a repository alias (`path@templates`). Aliases are declared by the document itself or by any document above
//! it and live in an [alias::AliasRegistry].
//!
//! ### Loading files
//!
//! A file is loaded by its [platform::Platform] into a [document::Document]. Loaders only need valid yaml; unknown
//! keys are ignored. `serde_yaml` does not expose positions, so [location::Locator] finds each declaration in the raw
//! text and hands out a [location::SourceLocation] per line. A line is only handed out once, which keeps two
//! identical declarations apart.
//!
//! ### Resolving
//!
//! see [resolve::Resolver::resolve]
//!
//! 1. [scan::scan] lists the sites of a document
//! 2. the document's own aliases are merged over the inherited ones
//! 3. each site is turned into a [source::Target] and fetched ([fetch::Fetcher]), the result parsed and resolved
//!    recursively with the merged aliases, the same credentials and the fetched file as origin
//! 4. [merge::merge] attaches each sub-document to the import with the same location, kind and key
//!
//! A site whose alias is unknown, whose platform cannot fetch or whose source is incomplete is skipped silently.
//! Anything else that goes wrong is collected in an [error::AggregatedError]; it never stops other sites.
//!
//! A source that is already being resolved further up is reported as a cycle instead of being fetched again.
//!
//! ### Output
//!
//! The merged document serializes via [serde].
//!
pub mod alias;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod location;
pub mod merge;
pub mod platform;
pub mod resolve;
pub mod scan;
pub mod source;
mod visit;
