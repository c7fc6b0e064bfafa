use std::collections::HashMap;
use std::rc::Rc;

use oxrdf::{NamedNode, NamedOrBlankNode};

use crate::composite::CompositeId;
use crate::sink::Statement;

/// An attribute after namespace resolution and value transforms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub namespace: String,
    pub local_name: String,
    pub value: String,
}

impl Property {
    pub fn iri(&self) -> String {
        format!("{}{}", self.namespace, self.local_name)
    }
}

/// Position of an open element in the builder's stack.
pub(crate) type ElementId = usize;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum MixedItem {
    Text(String),
    Element(NamedOrBlankNode),
}

/// One open XML element.
pub(crate) struct Element {
    pub element_type: NamedNode,
    pub namespace: String,
    pub local_name: String,
    pub uri: NamedOrBlankNode,
    pub parent: Option<ElementId>,
    /// 0-based position among the parent's children (or same-type children).
    pub sibling_index: Option<u64>,
    pub properties: Vec<Property>,
    /// Attribute values to be emitted as resources rather than literals.
    pub resource_properties: Vec<bool>,
    pub text: String,

    pub child_count: usize,
    /// Every closed child so far was collapsed to a literal or flattened.
    pub children_flat: bool,
    next_child_index: u64,
    next_child_index_by_type: HashMap<NamedNode, u64>,

    pub contains_mixed_content: bool,
    pub mixed_content: Vec<MixedItem>,

    pub shallow: bool,
    pub use_as_predicate: bool,
    pub auto_detected_as_literal: bool,

    pub composite_id: Option<CompositeId>,
    /// Statements from the subtree, held until the composite id resolves.
    pub deferred: Option<Vec<Statement>>,

    pub prefixes: Rc<curie::PrefixMapping>,
}

impl Element {
    pub fn new(
        element_type: NamedNode,
        namespace: String,
        local_name: String,
        uri: NamedOrBlankNode,
        prefixes: Rc<curie::PrefixMapping>,
    ) -> Self {
        Self {
            element_type,
            namespace,
            local_name,
            uri,
            parent: None,
            sibling_index: None,
            properties: Vec::new(),
            resource_properties: Vec::new(),
            text: String::new(),
            child_count: 0,
            children_flat: true,
            next_child_index: 0,
            next_child_index_by_type: HashMap::new(),
            contains_mixed_content: false,
            mixed_content: Vec::new(),
            shallow: false,
            use_as_predicate: false,
            auto_detected_as_literal: false,
            composite_id: None,
            deferred: None,
            prefixes,
        }
    }

    /// The trimmed character content, or `None` if there is none.
    pub fn value(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn has_text(&self) -> bool {
        self.text.chars().any(|c| !c.is_whitespace())
    }

    /// Registers a new child, returning its sibling position.
    pub fn next_child(&mut self, child_type: &NamedNode, per_type: bool) -> u64 {
        self.child_count += 1;
        if per_type {
            let counter = self
                .next_child_index_by_type
                .entry(child_type.clone())
                .or_default();
            let index = *counter;
            *counter += 1;
            index
        } else {
            let index = self.next_child_index;
            self.next_child_index += 1;
            index
        }
    }

    /// Starts recording mixed content, seeding it with the text so far.
    pub fn start_mixed_content(&mut self) {
        if self.contains_mixed_content {
            return;
        }

        self.contains_mixed_content = true;
        if self.has_text() {
            self.mixed_content.push(MixedItem::Text(self.text.clone()));
        }
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        if self.contains_mixed_content {
            match self.mixed_content.last_mut() {
                Some(MixedItem::Text(fragment)) => fragment.push_str(text),
                _ => self.mixed_content.push(MixedItem::Text(text.to_string())),
            }
        }
    }

    pub fn view(&self) -> ClosedElement<'_> {
        ClosedElement {
            element_type: &self.element_type,
            uri: &self.uri,
            value: self.value(),
            properties: &self.properties,
        }
    }
}

/// A read-only view of an element that has just been emitted.
#[derive(Clone, Copy, Debug)]
pub struct ClosedElement<'a> {
    pub element_type: &'a NamedNode,
    pub uri: &'a NamedOrBlankNode,
    pub value: Option<&'a str>,
    pub properties: &'a [Property],
}

impl ClosedElement<'_> {
    pub fn property(&self, local_name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.local_name == local_name)
            .map(|p| p.value.as_str())
    }
}

/// An element synthesized by a delayed-element transform. It is processed
/// as a child of the element that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticElement {
    pub element_type: String,
    pub value: Option<String>,
    /// `(attribute IRI, value)` pairs.
    pub properties: Vec<(String, String)>,
}

impl SyntheticElement {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            value: None,
            properties: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_property(mut self, iri: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((iri.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element() -> Element {
        Element::new(
            NamedNode::new_unchecked("http://t/a"),
            "http://t/".into(),
            "a".into(),
            oxrdf::BlankNode::new_unchecked("0").into(),
            Rc::default(),
        )
    }

    #[test]
    fn whitespace_only_text_has_no_value() {
        let mut el = element();
        el.push_text("  \n\t ");
        assert_eq!(el.value(), None);
        assert!(!el.has_text());

        el.push_text(" x ");
        assert_eq!(el.value(), Some("x"));
    }

    #[test]
    fn sibling_counters() {
        let mut el = element();
        let b = NamedNode::new_unchecked("http://t/b");
        let c = NamedNode::new_unchecked("http://t/c");
        assert_eq!(el.next_child(&b, true), 0);
        assert_eq!(el.next_child(&c, true), 0);
        assert_eq!(el.next_child(&b, true), 1);
        assert_eq!(el.next_child(&c, false), 0);
        assert_eq!(el.next_child(&c, false), 1);
        assert_eq!(el.child_count, 5);
    }

    #[test]
    fn mixed_content_merges_adjacent_text() {
        let mut el = element();
        el.push_text("text");
        el.start_mixed_content();
        el.mixed_content
            .push(MixedItem::Element(oxrdf::BlankNode::new_unchecked("1").into()));
        el.push_text("mo");
        el.push_text("re");

        assert_eq!(
            el.mixed_content,
            vec![
                MixedItem::Text("text".into()),
                MixedItem::Element(oxrdf::BlankNode::new_unchecked("1").into()),
                MixedItem::Text("more".into()),
            ]
        );
    }
}
