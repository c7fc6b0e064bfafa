use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use curie::{Curie, ExpansionError, PrefixMapping};
use itertools::Itertools;
use oxrdf::{BlankNode, NamedNode, NamedOrBlankNode};

use crate::Error;
use crate::config::{Config, Identity, IndexMode};
use crate::composite::CompositeId;
use crate::dispatch::{Message, Output};
use crate::element::{Element, ElementId, MixedItem, Property, SyntheticElement};
use crate::emit::{Outcome, ParentInfo};
use crate::sink::Statement;
use crate::xml::{XmlAttribute, XmlEventHandler};

enum Frame {
    Open(Box<Element>),
    /// Inert placeholder for an element inside a skipped subtree.
    Skipped,
}

impl Frame {
    fn element(&self) -> Option<&Element> {
        match self {
            Frame::Open(element) => Some(element),
            Frame::Skipped => None,
        }
    }

    fn element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Frame::Open(element) => Some(element),
            Frame::Skipped => None,
        }
    }
}

/// Builds elements from parse events and emits their statements as they
/// close.
///
/// The stack of open elements doubles as the element arena: an element's id
/// is its position in the stack, and a closed element is dropped once its
/// statements are out, so memory use follows the document depth.
pub(crate) struct TreeBuilder<'a, O> {
    pub(crate) config: &'a Config,
    output: &'a mut O,
    stack: Vec<Frame>,
    /// Stack position of the skipped subtree root, while inside one.
    skip_depth: Option<usize>,
    next_blank_node: u64,
    root_prefixes: Rc<PrefixMapping>,
    pending_prefixes: Vec<(String, String)>,
    observed_prefixes: HashSet<(String, String)>,
    delayed: VecDeque<SyntheticElement>,
}

impl<'a, O: Output> TreeBuilder<'a, O> {
    pub fn new(config: &'a Config, output: &'a mut O) -> Self {
        Self {
            config,
            output,
            stack: Vec::new(),
            skip_depth: None,
            next_blank_node: 0,
            root_prefixes: Rc::default(),
            pending_prefixes: Vec::new(),
            observed_prefixes: HashSet::new(),
            delayed: VecDeque::new(),
        }
    }

    /// Slash-separated local names of the open elements.
    fn path(&self) -> String {
        self.stack
            .iter()
            .filter_map(Frame::element)
            .map(|e| e.local_name.as_str())
            .join("/")
    }

    fn path_with(&self, local_name: &str) -> String {
        let path = self.path();
        if path.is_empty() {
            local_name.to_string()
        } else {
            format!("{path}/{local_name}")
        }
    }

    fn top_element(&self) -> Option<ElementId> {
        match self.stack.last() {
            Some(Frame::Open(_)) => Some(self.stack.len() - 1),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.stack.get_mut(id).and_then(Frame::element_mut)
    }

    fn parent_info(&self, id: ElementId) -> Option<ParentInfo> {
        let parent = self.stack.get(id)?.element()?;
        Some(ParentInfo {
            uri: parent.uri.clone(),
            element_type: parent.element_type.clone(),
            mixed: parent.contains_mixed_content,
        })
    }

    /// Sends a statement on, or holds it in the nearest open element that is
    /// still waiting for its composite identifier.
    pub(crate) fn emit(&mut self, statement: Statement) -> Result<(), Error> {
        tracing::trace!(?statement, "emit");
        for frame in self.stack.iter_mut().rev() {
            if let Some(deferred) = frame.element_mut().and_then(|e| e.deferred.as_mut()) {
                deferred.push(statement);
                return Ok(());
            }
        }

        self.output.put(Message::Statement(statement))
    }

    /// Labels are handed out in document order.
    pub(crate) fn new_blank_node(&mut self) -> BlankNode {
        let id = self.next_blank_node;
        self.next_blank_node += 1;
        BlankNode::new_unchecked(id.to_string())
    }

    fn new_identity(&mut self) -> Result<NamedOrBlankNode, Error> {
        match self.config.identity() {
            Identity::BlankNodes => Ok(self.new_blank_node().into()),
            Identity::Generated { namespace } => {
                let iri = format!("{namespace}{}", uuid::Uuid::new_v4().simple());
                Ok(named_node(iri)?.into())
            }
        }
    }

    fn scoped_prefixes(&mut self) -> Rc<PrefixMapping> {
        let parent = self
            .stack
            .iter()
            .rev()
            .find_map(Frame::element)
            .map_or_else(|| self.root_prefixes.clone(), |e| e.prefixes.clone());

        if self.pending_prefixes.is_empty() {
            return parent;
        }

        let mut mapping = Rc::unwrap_or_clone(parent);
        for (prefix, namespace) in self.pending_prefixes.drain(..) {
            if prefix.is_empty() {
                mapping.set_default(&namespace);
            } else if let Err(err) = mapping.add_prefix(&prefix, &namespace) {
                tracing::warn!(%prefix, ?err, "ignoring prefix declaration");
            }
        }
        Rc::new(mapping)
    }

    /// Splits a QName into its namespace (if any) and local name.
    fn resolve_qname(
        &self,
        value: &str,
        prefixes: &PrefixMapping,
        local_context: &str,
    ) -> Result<(Option<String>, String), Error> {
        let value = value.trim();
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, value),
        };

        if rxml_validation::validate_ncname(local).is_err() {
            return Err(Error::InvalidName {
                name: value.to_string(),
                path: self.path_with(local_context),
            });
        }

        match prefixes.expand_curie(&Curie::new(prefix, "")) {
            Ok(namespace) => Ok((Some(namespace), local.to_string())),
            Err(ExpansionError::MissingDefault) => Ok((None, local.to_string())),
            Err(ExpansionError::Invalid) => Err(Error::UnknownPrefix {
                prefix: prefix.unwrap_or_default().to_string(),
                path: self.path_with(local_context),
            }),
        }
    }

    /// Override namespace, then the document's namespace with the configured
    /// suffix, then the base namespace for names without one.
    fn element_namespace(&self, namespace: Option<String>) -> String {
        if let Some((namespace, applies_to)) = self.config.override_namespace() {
            if applies_to.elements() {
                return namespace.to_string();
            }
        }

        match (namespace, self.config.base_namespace()) {
            (Some(namespace), _) => self.config.normalize_namespace(namespace),
            (None, Some((base, applies_to))) if applies_to.elements() => base.to_string(),
            (None, _) => String::new(),
        }
    }

    /// Like [`Self::element_namespace`]; attributes without a namespace fall
    /// back to their element's namespace.
    fn attribute_namespace(&self, namespace: Option<&str>, element_namespace: &str) -> String {
        if let Some((namespace, applies_to)) = self.config.override_namespace() {
            if applies_to.attributes() {
                return namespace.to_string();
            }
        }

        match (namespace, self.config.base_namespace()) {
            (Some(namespace), _) => self.config.normalize_namespace(namespace.to_string()),
            (None, Some((base, applies_to))) if applies_to.attributes() => base.to_string(),
            (None, _) => element_namespace.to_string(),
        }
    }

    /// Copies values declared by ancestor lookups from the open ancestors.
    fn lookup_ancestors(&self, element: &mut Element) {
        let Some(composite) = element.composite_id.as_mut() else {
            return;
        };

        let found: Vec<(String, String)> = composite
            .pending_lookups()
            .filter_map(|lookup| {
                let ancestor = self
                    .stack
                    .iter()
                    .rev()
                    .filter_map(Frame::element)
                    .find(|a| a.element_type.as_str() == lookup.ancestor_type)?;

                let value = ancestor
                    .composite_id
                    .as_ref()
                    .and_then(|c| c.value(&lookup.name))
                    .or_else(|| {
                        ancestor
                            .properties
                            .iter()
                            .find(|p| p.local_name == lookup.name)
                            .map(|p| p.value.as_str())
                    })?;

                Some((lookup.alias.clone(), value.to_string()))
            })
            .collect();

        for (alias, value) in found {
            composite.provide_lookup(&alias, value);
        }
    }

    fn close(&mut self, mut element: Element) -> Result<(), Error> {
        if let Some(value) = element.value() {
            for ancestor in self.stack.iter_mut().rev().filter_map(Frame::element_mut) {
                if let Some(composite) = ancestor.composite_id.as_mut() {
                    if composite.offer_element(&element.local_name, value) {
                        break;
                    }
                }
            }
        }

        if element.composite_id.is_some() {
            self.lookup_ancestors(&mut element);
            let resolved = match element.composite_id.as_ref().and_then(CompositeId::resolve) {
                Some(resolved) => resolved,
                None => {
                    return Err(Error::UnresolvedCompositeId {
                        element_type: element.element_type.as_str().to_string(),
                        path: self.path_with(&element.local_name),
                        missing: element
                            .composite_id
                            .as_ref()
                            .map(CompositeId::missing)
                            .unwrap_or_default(),
                    });
                }
            };

            let resolved: NamedOrBlankNode = named_node(resolved)?.into();
            tracing::trace!(provisional = %element.uri, %resolved, "composite id resolved");
            let provisional = std::mem::replace(&mut element.uri, resolved);
            for mut statement in element.deferred.take().unwrap_or_default() {
                statement.rename_node(&provisional, &element.uri);
                self.emit(statement)?;
            }
        }

        let parent = element.parent.and_then(|id| self.parent_info(id));
        let outcome = self.classify_and_emit(&mut element, parent.as_ref())?;

        if let Some(parent) = element.parent.and_then(|id| self.element_mut(id)) {
            parent.children_flat &= element.shallow || element.auto_detected_as_literal;
            if parent.contains_mixed_content && outcome != Outcome::Literal {
                parent
                    .mixed_content
                    .push(MixedItem::Element(element.uri.clone()));
            }
        }

        if let Some(transform) = self.config.delayed(element.element_type.as_str()) {
            let synthesized = transform(&element.view());
            tracing::trace!(count = synthesized.len(), "delayed elements queued");
            self.delayed.extend(synthesized);
        }

        while let Some(synthetic) = self.delayed.pop_front() {
            self.emit_synthetic(&mut element, synthetic)?;
        }

        Ok(())
    }

    fn emit_synthetic(&mut self, owner: &mut Element, synthetic: SyntheticElement) -> Result<(), Error> {
        let element_type = named_node(synthetic.element_type)?;
        let (namespace, local_name) = split_iri(element_type.as_str());
        let (namespace, local_name) = (namespace.to_string(), local_name.to_string());
        let uri = self.new_identity()?;
        let mut element = Element::new(element_type, namespace, local_name, uri, owner.prefixes.clone());

        let per_type = self.config.index() == IndexMode::PerType;
        element.sibling_index = Some(owner.next_child(&element.element_type, per_type));
        element.use_as_predicate = self.config.use_as_predicate(element.element_type.as_str());
        if let Some(value) = synthetic.value {
            element.push_text(&value);
        }
        for (iri, value) in synthetic.properties {
            let (namespace, local_name) = split_iri(&iri);
            element.properties.push(Property {
                namespace: namespace.to_string(),
                local_name: local_name.to_string(),
                value,
            });
            element.resource_properties.push(false);
        }

        let parent = ParentInfo {
            uri: owner.uri.clone(),
            element_type: owner.element_type.clone(),
            mixed: false,
        };
        self.classify_and_emit(&mut element, Some(&parent))?;
        Ok(())
    }
}

impl<O: Output> XmlEventHandler for TreeBuilder<'_, O> {
    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<(), Error> {
        let declaration = (prefix.to_string(), namespace.to_string());
        if self.observed_prefixes.insert(declaration.clone()) {
            self.output.put(Message::Prefix {
                prefix: declaration.0.clone(),
                namespace: declaration.1.clone(),
            })?;
        }

        self.pending_prefixes.push(declaration);
        Ok(())
    }

    fn start_element(
        &mut self,
        namespace: Option<&str>,
        local_name: &str,
        attributes: &[XmlAttribute],
    ) -> Result<(), Error> {
        if self.skip_depth.is_some() {
            self.pending_prefixes.clear();
            self.stack.push(Frame::Skipped);
            return Ok(());
        }

        let prefixes = self.scoped_prefixes();

        let mut namespace = namespace.map(str::to_string);
        let mut local_name = local_name.to_string();
        if let Some(override_attribute) = self.config.type_override_attribute() {
            // matched on the raw namespace and local name, before any rules
            let overriding = attributes.iter().find(|a| {
                let namespace = a.namespace.as_deref().unwrap_or_default();
                override_attribute.strip_prefix(namespace) == Some(a.local_name.as_str())
            });

            if let Some(attribute) = overriding {
                let (ns, local) = self.resolve_qname(&attribute.value, &prefixes, &local_name)?;
                tracing::trace!(from = %local_name, to = %local, "element type overridden");
                namespace = ns.or(namespace);
                local_name = local;
            }
        }

        let namespace = self.element_namespace(namespace);
        let raw_type = format!("{namespace}{local_name}");
        let ancestors = self
            .stack
            .iter()
            .rev()
            .filter_map(Frame::element)
            .map(|e| e.element_type.as_str());
        let element_type = match self.config.rename_element(&raw_type, ancestors) {
            Some(renamed) => {
                tracing::trace!(from = %raw_type, to = %renamed, "element renamed");
                renamed
            }
            None => raw_type,
        };
        let element_type = named_node(element_type)?;

        if self.config.is_skipped(element_type.as_str()) {
            tracing::trace!(%element_type, "skipping subtree");
            self.skip_depth = Some(self.stack.len());
            self.stack.push(Frame::Skipped);
            return Ok(());
        }

        let uri = self.new_identity()?;
        let mut element = Element::new(element_type, namespace, local_name, uri, prefixes);
        let type_str = element.element_type.as_str().to_string();

        if let Some(parent_id) = self.top_element() {
            let per_type = self.config.index() == IndexMode::PerType;
            let child_type = element.element_type.clone();
            if let Some(parent) = self.element_mut(parent_id) {
                element.sibling_index = Some(parent.next_child(&child_type, per_type));
                if parent.has_text() {
                    parent.start_mixed_content();
                }
            }
            element.parent = Some(parent_id);
        }

        if self.config.forces_mixed_content(&type_str) {
            element.start_mixed_content();
        }
        element.use_as_predicate = self.config.use_as_predicate(&type_str);

        if let Some(rule) = self.config.composite_id(&type_str) {
            element.composite_id = Some(CompositeId::new(rule.clone()));
            element.deferred = Some(Vec::new());
        }

        for attribute in attributes {
            let namespace = self.attribute_namespace(attribute.namespace.as_deref(), &element.namespace);
            let mut iri = format!("{namespace}{}", attribute.local_name);
            let (namespace, attr_local_name) = match self.config.rename_attribute(&iri) {
                Some(renamed) => {
                    iri = renamed.to_string();
                    let (ns, local) = split_iri(renamed);
                    (ns.to_string(), local.to_string())
                }
                None => (namespace, attribute.local_name.clone()),
            };

            let mut value = match self.config.attribute_transform(&type_str, &iri) {
                Some(transform) => transform(&attribute.value),
                None => attribute.value.clone(),
            };

            let resource = self.config.resolves_qname(&iri);
            if resource {
                let (ns, local) = self.resolve_qname(&value, &element.prefixes, &element.local_name)?;
                value = format!("{}{local}", ns.unwrap_or_else(|| element.namespace.clone()));
            }

            if let Some(transform) = self.config.id_from_attribute(&type_str, &iri) {
                element.uri = named_node(transform(&value))?.into();
            }

            // attributes only ever count towards the element's own identifier
            if let Some(composite) = element.composite_id.as_mut() {
                composite.offer_attribute(&attribute.local_name, &value);
            }

            element.properties.push(Property {
                namespace,
                local_name: attr_local_name,
                value,
            });
            element.resource_properties.push(resource);
        }

        self.lookup_ancestors(&mut element);

        tracing::trace!(
            path = %self.path_with(&element.local_name),
            element_type = %element.element_type,
            uri = %element.uri,
            "element opened"
        );
        self.stack.push(Frame::Open(Box::new(element)));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), Error> {
        if self.skip_depth.is_some() {
            return Ok(());
        }

        if let Some(Frame::Open(element)) = self.stack.last_mut() {
            element.push_text(text);
        }
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), Error> {
        let frame = self.stack.pop().ok_or(Error::UnbalancedEndElement)?;
        match frame {
            Frame::Skipped => {
                if self.skip_depth == Some(self.stack.len()) {
                    self.skip_depth = None;
                }
                Ok(())
            }
            Frame::Open(element) => self.close(*element),
        }
    }

    fn end_document(&mut self) -> Result<(), Error> {
        if !self.stack.is_empty() {
            return Err(Error::UnclosedElements { path: self.path() });
        }

        tracing::debug!(nodes = self.next_blank_node, "document converted");
        Ok(())
    }
}

pub(crate) fn named_node(iri: String) -> Result<NamedNode, Error> {
    NamedNode::new(iri.clone()).map_err(|source| Error::IriParseError { source, iri })
}

/// Splits an IRI after its last `#` or `/`.
pub(crate) fn split_iri(iri: &str) -> (&str, &str) {
    match iri.rfind(['#', '/']) {
        Some(i) => iri.split_at(i + 1),
        None => ("", iri),
    }
}
