//! Push-style XML events.
//!
//! The conversion is written against [`XmlEventHandler`]; [`parse`] drives a
//! handler from a namespace-aware `quick-xml` reader. DTDs are never loaded
//! and external entities are never resolved.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::reader::NsReader;

use crate::Error;

/// An attribute as reported by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub local_name: String,
    pub value: String,
}

impl XmlAttribute {
    pub fn new(namespace: Option<&str>, local_name: &str, value: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
            value: value.to_string(),
        }
    }
}

pub trait XmlEventHandler {
    /// A namespace declaration on the element about to start. The empty
    /// prefix declares the default namespace.
    fn start_prefix_mapping(&mut self, prefix: &str, namespace: &str) -> Result<(), Error>;

    fn start_element(
        &mut self,
        namespace: Option<&str>,
        local_name: &str,
        attributes: &[XmlAttribute],
    ) -> Result<(), Error>;

    fn characters(&mut self, text: &str) -> Result<(), Error>;

    fn end_element(&mut self) -> Result<(), Error>;

    fn end_document(&mut self) -> Result<(), Error>;
}

/// Reads `input` to the end, reporting events to `handler`.
pub fn parse<R: BufRead>(input: R, handler: &mut impl XmlEventHandler) -> Result<(), Error> {
    let mut reader = NsReader::from_reader(input);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    loop {
        let position = reader.buffer_position() as u64;
        let xml_err = |source: quick_xml::Error| Error::Xml { source, position };

        let (namespace, event) = reader.read_resolved_event_into(&mut buf).map_err(xml_err)?;
        let namespace = match namespace {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(Error::UnknownPrefix {
                    prefix: String::from_utf8_lossy(&prefix).into_owned(),
                    path: String::new(),
                });
            }
        };

        match event {
            Event::Start(start) => {
                let mut attributes = Vec::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from).map_err(xml_err)?;
                    let value = attr
                        .unescape_value()
                        .map_err(quick_xml::Error::from)
                        .map_err(xml_err)?;

                    if let Some(declaration) = attr.key.as_namespace_binding() {
                        let prefix = match declaration {
                            PrefixDeclaration::Default => String::new(),
                            PrefixDeclaration::Named(prefix) => {
                                String::from_utf8_lossy(prefix).into_owned()
                            }
                        };
                        handler.start_prefix_mapping(&prefix, &value)?;
                        continue;
                    }

                    let (attr_namespace, local_name) = reader.resolve_attribute(attr.key);
                    let attr_namespace = match attr_namespace {
                        ResolveResult::Bound(ns) => {
                            Some(String::from_utf8_lossy(ns.as_ref()).into_owned())
                        }
                        ResolveResult::Unbound => None,
                        ResolveResult::Unknown(prefix) => {
                            return Err(Error::UnknownPrefix {
                                prefix: String::from_utf8_lossy(&prefix).into_owned(),
                                path: String::from_utf8_lossy(local_name.as_ref()).into_owned(),
                            });
                        }
                    };

                    attributes.push(XmlAttribute {
                        namespace: attr_namespace,
                        local_name: String::from_utf8_lossy(local_name.as_ref()).into_owned(),
                        value: value.into_owned(),
                    });
                }

                let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                handler.start_element(namespace.as_deref(), &local_name, &attributes)?;
            }
            Event::End(_) => handler.end_element()?,
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(quick_xml::Error::from)
                    .map_err(xml_err)?;
                handler.characters(&text)?;
            }
            Event::CData(cdata) => {
                let text = reader
                    .decoder()
                    .decode(&cdata)
                    .map_err(quick_xml::Error::from)
                    .map_err(xml_err)?;
                handler.characters(&text)?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions and doctypes
            // carry nothing to convert
            _ => {}
        }

        buf.clear();
    }

    handler.end_document()
}
