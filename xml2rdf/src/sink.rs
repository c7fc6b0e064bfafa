//! The destination of emitted statements.
//!
//! The conversion only ever talks to a [`Sink`]. Backends decide how the
//! statements are materialized: [`GraphSink`] collects them in an
//! [`oxrdf::Graph`], [`crate::TextSink`] writes them out as text.

use curie::PrefixMapping;
use oxrdf::vocab::rdf;
use oxrdf::{
    BlankNode, Graph, Literal, LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode,
    NamedOrBlankNodeRef, TermRef, TripleRef,
};

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum SinkError {
    #[display("I/O error: {_0}")]
    Io(std::io::Error),

    #[display("{_0}")]
    #[from(ignore)]
    Backend(#[error(not(source))] String),

    /// The producer went away without signalling the end of the stream.
    #[display("The conversion was interrupted")]
    #[from(ignore)]
    Interrupted,
}

/// A member of an ordered mixed-content collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListItem {
    Literal(Literal),
    Resource(NamedOrBlankNode),
}

/// The abstract unit crossing from the conversion into a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Resource {
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        object: NamedOrBlankNode,
    },
    Literal {
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        object: Literal,
    },
    /// `nodes` holds one cell per item, so list labels follow the document.
    List {
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        items: Vec<ListItem>,
        nodes: Vec<BlankNode>,
    },
}

impl Statement {
    pub fn subject(&self) -> &NamedOrBlankNode {
        match self {
            Statement::Resource { subject, .. }
            | Statement::Literal { subject, .. }
            | Statement::List { subject, .. } => subject,
        }
    }

    pub fn predicate(&self) -> &NamedNode {
        match self {
            Statement::Resource { predicate, .. }
            | Statement::Literal { predicate, .. }
            | Statement::List { predicate, .. } => predicate,
        }
    }

    /// Replaces every occurrence of `from` with `to`.
    pub(crate) fn rename_node(&mut self, from: &NamedOrBlankNode, to: &NamedOrBlankNode) {
        let replace = |node: &mut NamedOrBlankNode| {
            if node == from {
                *node = to.clone();
            }
        };

        match self {
            Statement::Resource {
                subject, object, ..
            } => {
                replace(subject);
                replace(object);
            }
            Statement::Literal { subject, .. } => replace(subject),
            Statement::List { subject, items, .. } => {
                replace(subject);
                for item in items {
                    if let ListItem::Resource(node) = item {
                        replace(node);
                    }
                }
            }
        }
    }

    /// Hands the statement to `sink`.
    pub fn apply(&self, sink: &mut (impl Sink + ?Sized)) -> Result<(), SinkError> {
        match self {
            Statement::Resource {
                subject,
                predicate,
                object,
            } => sink.create_triple(subject.as_ref(), predicate.as_ref(), object.as_ref()),
            Statement::Literal {
                subject,
                predicate,
                object,
            } => sink.create_triple_literal(subject.as_ref(), predicate.as_ref(), object.as_ref()),
            Statement::List {
                subject,
                predicate,
                items,
                nodes,
            } => sink.create_list(subject.as_ref(), predicate.as_ref(), items, nodes),
        }
    }
}

pub(crate) fn node_term(node: NamedOrBlankNodeRef<'_>) -> TermRef<'_> {
    match node {
        NamedOrBlankNodeRef::NamedNode(n) => n.into(),
        NamedOrBlankNodeRef::BlankNode(b) => b.into(),
    }
}

/// A backend materializing statements.
///
/// Sinks run on the conversion's consumer thread.
pub trait Sink {
    fn create_triple(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: NamedOrBlankNodeRef<'_>,
    ) -> Result<(), SinkError>;

    fn create_triple_literal(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        literal: LiteralRef<'_>,
    ) -> Result<(), SinkError>;

    /// Writes an ordered collection as an `rdf:first`/`rdf:rest` chain
    /// terminated by `rdf:nil`, using `nodes` for the cells.
    fn create_list(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        items: &[ListItem],
        nodes: &[BlankNode],
    ) -> Result<(), SinkError> {
        if nodes.len() != items.len() {
            return Err(SinkError::Backend(format!(
                "list of {} items given {} nodes",
                items.len(),
                nodes.len()
            )));
        }
        let Some(head) = nodes.first() else {
            return self.create_triple(subject, predicate, rdf::NIL.into());
        };

        self.create_triple(subject, predicate, head.as_ref().into())?;
        for (i, (item, node)) in items.iter().zip(nodes).enumerate() {
            let node = NamedOrBlankNodeRef::from(node.as_ref());
            match item {
                ListItem::Literal(literal) => {
                    self.create_triple_literal(node, rdf::FIRST, literal.as_ref())?
                }
                ListItem::Resource(resource) => {
                    self.create_triple(node, rdf::FIRST, resource.as_ref())?
                }
            }

            let rest: NamedOrBlankNodeRef<'_> = nodes
                .get(i + 1)
                .map_or(rdf::NIL.into(), |next| next.as_ref().into());
            self.create_triple(node, rdf::REST, rest)?;
        }

        Ok(())
    }

    /// Called once after the last statement. `prefixes` holds the namespace
    /// prefixes declared in the document.
    fn end_of_stream(&mut self, prefixes: &PrefixMapping) -> Result<(), SinkError> {
        let _ = prefixes;
        Ok(())
    }
}

/// Collects the conversion into an in-memory graph.
#[derive(Default)]
pub struct GraphSink {
    graph: Graph,
    prefixes: PrefixMapping,
}

impl GraphSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// The prefixes registered when the stream ended.
    pub fn prefixes(&self) -> &PrefixMapping {
        &self.prefixes
    }
}

impl Sink for GraphSink {
    fn create_triple(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: NamedOrBlankNodeRef<'_>,
    ) -> Result<(), SinkError> {
        self.graph
            .insert(TripleRef::new(subject, predicate, node_term(object)));
        Ok(())
    }

    fn create_triple_literal(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        literal: LiteralRef<'_>,
    ) -> Result<(), SinkError> {
        self.graph.insert(TripleRef::new(subject, predicate, literal));
        Ok(())
    }

    fn end_of_stream(&mut self, prefixes: &PrefixMapping) -> Result<(), SinkError> {
        for (prefix, namespace) in prefixes.mappings() {
            if let Err(err) = self.prefixes.add_prefix(prefix, namespace) {
                tracing::warn!(prefix = %prefix, ?err, "ignoring reserved prefix");
            }
        }
        Ok(())
    }
}
