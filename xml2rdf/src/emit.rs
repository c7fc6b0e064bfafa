//! Turning a closed element into statements.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Literal, NamedNode, NamedOrBlankNode};

use crate::Error;
use crate::builder::{TreeBuilder, named_node};
use crate::datatype;
use crate::dispatch::Output;
use crate::element::{Element, MixedItem};
use crate::sink::{ListItem, Statement};
use crate::vocab;

/// How a closed element was represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Folded into a property of its parent.
    Literal,
    /// Linked from its parent with its own type as predicate.
    Shallow,
    Node,
}

/// What a closing element needs to know about its parent.
#[derive(Clone, Debug)]
pub(crate) struct ParentInfo {
    pub uri: NamedOrBlankNode,
    pub element_type: NamedNode,
    pub mixed: bool,
}

impl<O: Output> TreeBuilder<'_, O> {
    pub(crate) fn classify_and_emit(
        &mut self,
        element: &mut Element,
        parent: Option<&ParentInfo>,
    ) -> Result<Outcome, Error> {
        if let Some(parent) = parent {
            if self.is_literal(element, parent) {
                element.auto_detected_as_literal = true;
                self.emit_literal(element, parent)?;
                return Ok(Outcome::Literal);
            }

            if self.config.shallow() && element.children_flat && !element.contains_mixed_content {
                element.shallow = true;
                self.emit_shallow(element, parent)?;
                return Ok(Outcome::Shallow);
            }
        }

        self.emit_node(element, parent)?;
        Ok(Outcome::Node)
    }

    fn is_literal(&self, element: &Element, parent: &ParentInfo) -> bool {
        self.config.auto_literals()
            && element.child_count == 0
            && element.properties.is_empty()
            && !element.contains_mixed_content
            && !parent.mixed
            && element.composite_id.is_none()
            && element.value().is_some()
    }

    fn emit_literal(&mut self, element: &Element, parent: &ParentInfo) -> Result<(), Error> {
        tracing::trace!(element_type = %element.element_type, "collapsed to literal");
        let Some(value) = element.value() else {
            return Ok(());
        };

        let statement = self.value_statement(
            parent.uri.clone(),
            element.element_type.clone(),
            element.element_type.as_str(),
            value,
        )?;
        self.emit(statement)
    }

    fn emit_shallow(&mut self, element: &Element, parent: &ParentInfo) -> Result<(), Error> {
        tracing::trace!(element_type = %element.element_type, "flattened to property");
        self.emit(Statement::Resource {
            subject: parent.uri.clone(),
            predicate: element.element_type.clone(),
            object: element.uri.clone(),
        })?;
        self.emit_type(element)?;
        self.emit_value(element)?;
        self.emit_properties(element)?;
        self.emit_index(element)
    }

    fn emit_node(&mut self, element: &Element, parent: Option<&ParentInfo>) -> Result<(), Error> {
        self.emit_type(element)?;

        if let Some(parent) = parent {
            let predicate = if element.use_as_predicate {
                element.element_type.clone()
            } else {
                self.config
                    .inserted_predicate(parent.element_type.as_str(), element.element_type.as_str())
                    .cloned()
                    .unwrap_or_else(|| vocab::HAS_CHILD.into_owned())
            };

            let inverted = self.config.is_inverted(
                predicate.as_str(),
                parent.element_type.as_str(),
                element.element_type.as_str(),
            );
            let (subject, object) = if inverted {
                (element.uri.clone(), parent.uri.clone())
            } else {
                (parent.uri.clone(), element.uri.clone())
            };
            self.emit(Statement::Resource {
                subject,
                predicate,
                object,
            })?;
        }

        if !element.contains_mixed_content {
            self.emit_value(element)?;
        }
        self.emit_properties(element)?;
        self.emit_index(element)?;

        if element.contains_mixed_content {
            let items = element
                .mixed_content
                .iter()
                .filter_map(|item| match item {
                    MixedItem::Text(text) if text.trim().is_empty() => None,
                    MixedItem::Text(text) => Some(ListItem::Literal(Literal::new_simple_literal(text))),
                    MixedItem::Element(uri) => Some(ListItem::Resource(uri.clone())),
                })
                .collect::<Vec<_>>();
            let nodes = items.iter().map(|_| self.new_blank_node()).collect();
            self.emit(Statement::List {
                subject: element.uri.clone(),
                predicate: vocab::HAS_MIXED_CONTENT.into_owned(),
                items,
                nodes,
            })?;
        }

        Ok(())
    }

    fn emit_type(&mut self, element: &Element) -> Result<(), Error> {
        self.emit(Statement::Resource {
            subject: element.uri.clone(),
            predicate: rdf::TYPE.into_owned(),
            object: element.element_type.clone().into(),
        })
    }

    fn emit_value(&mut self, element: &Element) -> Result<(), Error> {
        let Some(value) = element.value() else {
            return Ok(());
        };

        let statement = self.value_statement(
            element.uri.clone(),
            vocab::HAS_VALUE.into_owned(),
            element.element_type.as_str(),
            value,
        )?;
        self.emit(statement)
    }

    fn emit_properties(&mut self, element: &Element) -> Result<(), Error> {
        for (property, &resource) in element.properties.iter().zip(&element.resource_properties) {
            let iri = property.iri();
            let predicate = named_node(iri)?;
            let statement = if resource {
                Statement::Resource {
                    subject: element.uri.clone(),
                    object: named_node(property.value.clone())?.into(),
                    predicate,
                }
            } else {
                Statement::Literal {
                    subject: element.uri.clone(),
                    object: self.literal(predicate.as_str(), &property.value),
                    predicate,
                }
            };
            self.emit(statement)?;
        }
        Ok(())
    }

    fn emit_index(&mut self, element: &Element) -> Result<(), Error> {
        if self.config.index() == crate::IndexMode::None {
            return Ok(());
        }

        let Some(index) = element.sibling_index else {
            return Ok(());
        };

        self.emit(Statement::Literal {
            subject: element.uri.clone(),
            predicate: vocab::INDEX.into_owned(),
            object: Literal::new_typed_literal(index.to_string(), xsd::INTEGER),
        })
    }

    /// The text of an element of `element_type`, as a mapped resource or a
    /// typed literal.
    fn value_statement(
        &self,
        subject: NamedOrBlankNode,
        predicate: NamedNode,
        element_type: &str,
        value: &str,
    ) -> Result<Statement, Error> {
        if let Some(mapping) = self.config.value_mapping(element_type) {
            return Ok(Statement::Resource {
                subject,
                predicate,
                object: named_node(mapping(value))?.into(),
            });
        }

        Ok(Statement::Literal {
            subject,
            predicate,
            object: self.literal(element_type, value),
        })
    }

    /// Explicit datatype first, then inference when enabled.
    fn literal(&self, datatype_key: &str, value: &str) -> Literal {
        if let Some(datatype) = self.config.datatype(datatype_key) {
            return Literal::new_typed_literal(value, datatype.clone());
        }

        if self.config.auto_type_literals() {
            if let Some(datatype) = datatype::infer(value) {
                return Literal::new_typed_literal(value, datatype);
            }
        }

        Literal::new_simple_literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppliesTo, Config};
    use crate::dispatch::Message;

    #[derive(Default)]
    struct Collect(Vec<Statement>);

    impl Output for Collect {
        fn put(&mut self, message: Message) -> Result<(), Error> {
            if let Message::Statement(statement) = message {
                self.0.push(statement);
            }
            Ok(())
        }
    }

    fn run(config: &Config, input: &str) -> Vec<Statement> {
        let mut output = Collect::default();
        let mut builder = TreeBuilder::new(config, &mut output);
        crate::xml::parse(input.as_bytes(), &mut builder).unwrap();
        output.0
    }

    fn config() -> crate::ConfigBuilder {
        Config::builder().override_namespace("http://t/", AppliesTo::BothElementsAndAttributes)
    }

    #[test]
    fn literal_needs_text() {
        let config = config().auto_detect_literal_properties().build().unwrap();
        let statements = run(&config, "<a><b/></a>");
        // an empty leaf is still a node
        assert_eq!(statements.len(), 3);
        assert!(statements.iter().any(|s| s.predicate().as_ref() == vocab::HAS_CHILD));
    }

    #[test]
    fn mixed_parent_keeps_children_as_nodes() {
        let config = config().auto_detect_literal_properties().build().unwrap();
        let statements = run(&config, "<a>x<b>y</b></a>");

        let (owner, list) = statements
            .iter()
            .find_map(|s| match s {
                Statement::List { subject, items, .. } => Some((subject.clone(), items.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(list.len(), 2);
        assert!(matches!(&list[1], ListItem::Resource(_)));
        assert!(
            !statements
                .iter()
                .any(|s| s.predicate().as_ref() == vocab::HAS_VALUE && *s.subject() == owner)
        );
        // the child keeps its own value
        assert!(
            statements
                .iter()
                .any(|s| s.predicate().as_ref() == vocab::HAS_VALUE && *s.subject() != owner)
        );
    }

    #[test]
    fn explicit_datatype_beats_inference() {
        let config = config()
            .auto_type_literals()
            .datatype("http://t/code", xsd::STRING.as_str())
            .build()
            .unwrap();
        let statements = run(&config, r#"<a code="12" n="12"/>"#);

        let literal = |name: &str| {
            statements
                .iter()
                .find_map(|s| match s {
                    Statement::Literal { predicate, object, .. } if predicate.as_str() == name => {
                        Some(object.datatype().into_owned())
                    }
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(literal("http://t/code"), xsd::STRING.into_owned());
        assert_eq!(literal("http://t/n"), xsd::INTEGER.into_owned());
    }

    #[test]
    fn inverted_parent_link() {
        let config = config()
            .insert_predicate("http://t/partOf", None, Some("http://t/b"))
            .invert_predicate(Some("http://t/partOf"), None, None)
            .build()
            .unwrap();
        let statements = run(&config, "<a><b/></a>");

        let link = statements
            .iter()
            .find(|s| s.predicate().as_str() == "http://t/partOf")
            .unwrap();
        match link {
            Statement::Resource { subject, object, .. } => {
                assert_eq!(subject.to_string(), "_:1");
                assert_eq!(object.to_string(), "_:0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
