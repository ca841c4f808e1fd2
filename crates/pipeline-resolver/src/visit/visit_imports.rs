use super::{Visit, VisitMut};
use crate::document::{Document, Import, ImportKind, Job, Step};

/// Visit the [Import] declarations of one document, in document order
///
/// Attached sub-documents are not descended into.
pub trait VisitImports {
    fn visit_imports(&self, visitor: &mut dyn Visit<Import>);
}

/// Mutable counterpart of [VisitImports], same order
pub trait VisitImportsMut {
    fn visit_imports_mut(&mut self, visitor: &mut dyn VisitMut<Import>);
}

impl VisitImports for Document {
    fn visit_imports(&self, visitor: &mut dyn Visit<Import>) {
        for import in &self.defaults.imports {
            visitor.visit(ImportKind::Defaults, import);
        }

        if let Some(extends) = &self.extends {
            visitor.visit(ImportKind::Extends, extends);
        }

        for job in &self.jobs {
            job.visit_imports(visitor);
        }
    }
}

impl VisitImportsMut for Document {
    fn visit_imports_mut(&mut self, visitor: &mut dyn VisitMut<Import>) {
        for import in &mut self.defaults.imports {
            visitor.visit_mut(ImportKind::Defaults, import);
        }

        if let Some(extends) = &mut self.extends {
            visitor.visit_mut(ImportKind::Extends, extends);
        }

        for job in &mut self.jobs {
            job.visit_imports_mut(visitor);
        }
    }
}

impl VisitImports for Job {
    fn visit_imports(&self, visitor: &mut dyn Visit<Import>) {
        if let Some(import) = &self.import {
            visitor.visit(ImportKind::Job, import);
        }

        for import in &self.variables_imports {
            visitor.visit(ImportKind::JobVariables, import);
        }

        for step in self.pre_steps.iter().chain(&self.steps).chain(&self.post_steps) {
            step.visit_imports(visitor);
        }
    }
}

impl VisitImportsMut for Job {
    fn visit_imports_mut(&mut self, visitor: &mut dyn VisitMut<Import>) {
        if let Some(import) = &mut self.import {
            visitor.visit_mut(ImportKind::Job, import);
        }

        for import in &mut self.variables_imports {
            visitor.visit_mut(ImportKind::JobVariables, import);
        }

        for step in self
            .pre_steps
            .iter_mut()
            .chain(&mut self.steps)
            .chain(&mut self.post_steps)
        {
            step.visit_imports_mut(visitor);
        }
    }
}

impl VisitImports for Step {
    fn visit_imports(&self, visitor: &mut dyn Visit<Import>) {
        if let Some(import) = &self.import {
            visitor.visit(ImportKind::Step, import);
        }

        for import in &self.variables_imports {
            visitor.visit(ImportKind::StepVariables, import);
        }
    }
}

impl VisitImportsMut for Step {
    fn visit_imports_mut(&mut self, visitor: &mut dyn VisitMut<Import>) {
        if let Some(import) = &mut self.import {
            visitor.visit_mut(ImportKind::Step, import);
        }

        for import in &mut self.variables_imports {
            visitor.visit_mut(ImportKind::StepVariables, import);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::location::SourceLocation;
    use crate::platform::Platform;
    use crate::source::SourceDescriptor;
    use pretty_assertions::assert_eq;

    fn import(line: usize, key: &str) -> Import {
        Import::new(
            SourceLocation::line(line, 1, 10),
            key.to_string(),
            SourceDescriptor::local(key),
        )
    }

    #[test]
    fn mutable_visit_reaches_every_slot() {
        let mut document = Document::new(Platform::Azure);
        document.defaults.imports.push(import(1, "a.yml"));
        let mut job = Job::new("build".into(), SourceLocation::line(2, 1, 10));
        job.variables_imports.push(import(3, "b.yml"));
        let mut step = Step::new(SourceLocation::line(4, 1, 10));
        step.variables_imports = vec![import(4, "c.yml"), import(5, "d.yml")];
        job.post_steps.push(step);
        document.jobs.push(job);

        let mut kinds = vec![];
        document.visit_imports_mut(&mut |kind: ImportKind, import: &mut Import| {
            kinds.push(kind);
            import.key.push('!');
        });

        assert_eq!(
            kinds,
            vec![
                ImportKind::Defaults,
                ImportKind::JobVariables,
                ImportKind::StepVariables,
                ImportKind::StepVariables
            ]
        );
        assert_eq!(document.defaults.imports[0].key, "a.yml!");
    }
}
