//! Identifiers computed from several pieces of an element's subtree.
//!
//! A [`CompositeIdRule`] names the contributions an element type needs before
//! its identifier can be computed: values of descendant elements, values of
//! its own attributes, and values already known by an open ancestor. While
//! the element is open those contributions are collected in a
//! [`CompositeId`]; once complete, the user mapping function turns them into
//! an IRI that replaces the element's provisional blank node.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub type CompositeMapping =
    Arc<dyn Fn(&IndexMap<String, String>, &IndexMap<String, String>) -> String + Send + Sync>;

/// A value copied from an open ancestor when the element opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestorLookup {
    pub ancestor_type: String,
    pub name: String,
    pub alias: String,
}

#[derive(Clone)]
pub struct CompositeIdRule {
    pub(crate) element_type: String,
    pub(crate) elements: Vec<String>,
    pub(crate) attributes: Vec<String>,
    pub(crate) ancestors: Vec<AncestorLookup>,
    pub(crate) mapping: Option<CompositeMapping>,
}

impl fmt::Debug for CompositeIdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeIdRule")
            .field("element_type", &self.element_type)
            .field("elements", &self.elements)
            .field("attributes", &self.attributes)
            .field("ancestors", &self.ancestors)
            .finish_non_exhaustive()
    }
}

impl CompositeIdRule {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            elements: Vec::new(),
            attributes: Vec::new(),
            ancestors: Vec::new(),
            mapping: None,
        }
    }

    /// Requires the text of a descendant element with this local name.
    pub fn from_element(mut self, local_name: impl Into<String>) -> Self {
        self.elements.push(local_name.into());
        self
    }

    /// Requires an attribute with this local name on the element itself.
    pub fn from_attribute(mut self, local_name: impl Into<String>) -> Self {
        self.attributes.push(local_name.into());
        self
    }

    /// Copies `name` from the nearest open ancestor of `ancestor_type`, made
    /// available to the mapping function as `alias` in the element map.
    pub fn from_ancestor(
        mut self,
        ancestor_type: impl Into<String>,
        name: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.ancestors.push(AncestorLookup {
            ancestor_type: ancestor_type.into(),
            name: name.into(),
            alias: alias.into(),
        });
        self
    }

    /// The function computing the identifier from the element map and the
    /// attribute map.
    pub fn mapped_to<F>(mut self, mapping: F) -> Self
    where
        F: Fn(&IndexMap<String, String>, &IndexMap<String, String>) -> String
            + Send
            + Sync
            + 'static,
    {
        self.mapping = Some(Arc::new(mapping));
        self
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub(crate) fn local_names(&self) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .chain(self.attributes.iter())
            .chain(self.ancestors.iter().map(|a| &a.alias))
            .map(String::as_str)
    }
}

/// The contributions collected so far for one open element.
pub(crate) struct CompositeId {
    rule: Arc<CompositeIdRule>,
    elements: IndexMap<String, String>,
    attributes: IndexMap<String, String>,
}

impl CompositeId {
    pub fn new(rule: Arc<CompositeIdRule>) -> Self {
        Self {
            rule,
            elements: IndexMap::new(),
            attributes: IndexMap::new(),
        }
    }

    /// Offers the value of a closed descendant. Returns whether it was taken;
    /// the first value for a name wins.
    pub fn offer_element(&mut self, local_name: &str, value: &str) -> bool {
        if self.elements.contains_key(local_name)
            || !self.rule.elements.iter().any(|e| e == local_name)
        {
            return false;
        }

        self.elements
            .insert(local_name.to_string(), value.to_string());
        true
    }

    pub fn offer_attribute(&mut self, local_name: &str, value: &str) -> bool {
        if self.attributes.contains_key(local_name)
            || !self.rule.attributes.iter().any(|a| a == local_name)
        {
            return false;
        }

        self.attributes
            .insert(local_name.to_string(), value.to_string());
        true
    }

    /// Ancestor lookups that still have no value.
    pub fn pending_lookups(&self) -> impl Iterator<Item = &AncestorLookup> {
        self.rule
            .ancestors
            .iter()
            .filter(|lookup| !self.elements.contains_key(&lookup.alias))
    }

    pub fn provide_lookup(&mut self, alias: &str, value: String) {
        self.elements.entry(alias.to_string()).or_insert(value);
    }

    /// Looks up a collected value by name, elements first.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.elements
            .get(name)
            .or_else(|| self.attributes.get(name))
            .map(String::as_str)
    }

    pub fn completed(&self) -> bool {
        self.elements.len() == self.rule.elements.len() + self.rule.ancestors.len()
            && self.attributes.len() == self.rule.attributes.len()
    }

    /// Names of the contributions that have not arrived.
    pub fn missing(&self) -> Vec<String> {
        let elements = self
            .rule
            .elements
            .iter()
            .filter(|name| !self.elements.contains_key(*name))
            .cloned();
        let attributes = self
            .rule
            .attributes
            .iter()
            .filter(|name| !self.attributes.contains_key(*name))
            .map(|name| format!("@{name}"));
        let ancestors = self
            .pending_lookups()
            .map(|lookup| format!("{} of <{}>", lookup.name, lookup.ancestor_type));

        elements.chain(attributes).chain(ancestors).collect()
    }

    /// Computes the identifier, or `None` while contributions are missing.
    pub fn resolve(&self) -> Option<String> {
        if !self.completed() {
            return None;
        }

        let mapping = self.rule.mapping.as_ref()?;
        Some(mapping(&self.elements, &self.attributes))
    }
}
