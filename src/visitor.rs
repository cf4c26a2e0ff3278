//! The single-dispatch traversal contract shared by engines that walk the
//! declaration graph, including external code generators.

use crate::error::ConcertoResult;
use crate::introspect::{ClassDeclaration, DeclarationKind, Property};
use crate::model_file::ModelFile;
use crate::model_manager::ModelManager;

/// A node of the declaration graph, tagged by kind.
#[derive(Clone, Copy)]
pub enum Node<'m> {
    ModelManager(&'m ModelManager),
    ModelFile(&'m ModelFile),
    ClassDeclaration(&'m ClassDeclaration),
    Property(&'m ClassDeclaration, &'m Property),
}

impl<'m> Node<'m> {
    pub fn is_model_manager(&self) -> bool {
        matches!(self, Node::ModelManager(_))
    }

    pub fn is_model_file(&self) -> bool {
        matches!(self, Node::ModelFile(_))
    }

    pub fn is_class_declaration(&self) -> bool {
        matches!(self, Node::ClassDeclaration(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Node::ClassDeclaration(d) if d.kind() == DeclarationKind::Enum)
    }

    pub fn is_field(&self) -> bool {
        matches!(self, Node::Property(_, p) if p.is_field())
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, Node::Property(_, p) if p.is_relationship())
    }

    pub fn is_enum_value(&self) -> bool {
        matches!(self, Node::Property(_, p) if p.is_enum_value())
    }
}

/// One `visit` entry point; results accumulate in the parameters object
/// (a file-writer sink for code generators, an output accumulator for
/// serialization-like walks).
pub trait Visitor {
    type Parameters;
    type Output;

    fn visit(
        &mut self,
        node: Node<'_>,
        parameters: &mut Self::Parameters,
    ) -> ConcertoResult<Self::Output>;
}
