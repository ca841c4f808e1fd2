//! repository aliases
//!
//! A document may declare repositories under a short alias (azure: `resources.repositories`) and import templates
//! from them as `path@alias`. Declarations cascade down the document hierarchy: a fetched template sees its own
//! declarations first, then everything its ancestors declared.
use crate::platform::Platform;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceDeclaration {
    pub alias: String,
    pub scm: Platform,
    /// Falls back to the organization of the resolution context when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Ordered set of [ResourceDeclaration]s, earlier entries win
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasRegistry {
    entries: Vec<ResourceDeclaration>,
}

impl AliasRegistry {
    pub fn new(declarations: impl IntoIterator<Item = ResourceDeclaration>) -> Self {
        let mut registry = Self::default();
        registry.extend(declarations);
        registry
    }

    /// Registry visible to a child document: the child's own declarations, then the parent's
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn merge(parent: &AliasRegistry, child: &[ResourceDeclaration]) -> AliasRegistry {
        let mut merged = AliasRegistry::new(child.iter().cloned());
        merged.extend(parent.entries.iter().cloned());
        tracing::trace!(entries = merged.entries.len(), "merged alias registry");
        merged
    }

    fn extend(&mut self, declarations: impl IntoIterator<Item = ResourceDeclaration>) {
        for declaration in declarations {
            if !self.entries.contains(&declaration) {
                self.entries.push(declaration);
            }
        }
    }

    /// First declaration of `alias` for the given scm
    ///
    /// Declarations for other scms are ignored, cross-platform repository imports are not supported.
    pub fn lookup(&self, alias: &str, scm: Platform) -> Option<&ResourceDeclaration> {
        self.entries
            .iter()
            .find(|entry| entry.alias == alias && entry.scm == scm)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDeclaration> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
