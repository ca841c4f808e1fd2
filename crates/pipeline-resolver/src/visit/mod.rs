//! visitor pattern helpers
mod visit_imports;
pub use visit_imports::{VisitImports, VisitImportsMut};

use crate::document::ImportKind;

/// Visitor that visits its subjects together with the slot they occupy
pub trait Visit<T> {
    fn visit(&mut self, kind: ImportKind, value: &T);
}

/// Visitor that visits its subjects mutably
pub trait VisitMut<T> {
    fn visit_mut(&mut self, kind: ImportKind, value: &mut T);
}

// blanket impls for closures
impl<T, F> Visit<T> for F
where
    F: FnMut(ImportKind, &T),
{
    fn visit(&mut self, kind: ImportKind, value: &T) {
        self(kind, value)
    }
}

impl<T, F> VisitMut<T> for F
where
    F: FnMut(ImportKind, &mut T),
{
    fn visit_mut(&mut self, kind: ImportKind, value: &mut T) {
        self(kind, value)
    }
}
