//! Streaming XML to RDF conversion.
//!
//! A conversion reads an XML document as push-style events, builds a small
//! tree of the currently open elements, and emits RDF statements as soon as an
//! element closes. Statements cross a bounded queue into a consumer thread that
//! materializes them into a [`Sink`].
//!
//! ```
//! use std::sync::Arc;
//! use xml2rdf::{AppliesTo, Config, GraphSink};
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .override_namespace("http://t/", AppliesTo::BothElementsAndAttributes)
//!         .auto_detect_literal_properties()
//!         .build()
//!         .unwrap(),
//! );
//!
//! let input = r#"<A xmlns="http://t/"><name>Bob</name></A>"#;
//! let sink = xml2rdf::convert_str(&config, input, GraphSink::new()).unwrap();
//! assert_eq!(sink.graph().len(), 2);
//! ```

use std::io::BufRead;

mod builder;
pub mod composite;
pub mod config;
mod datatype;
mod dispatch;
mod element;
mod emit;
mod rename;
pub mod sink;
pub mod text;
pub mod xml;

pub use composite::CompositeIdRule;
pub use config::{AppliesTo, Config, ConfigBuilder, ConfigError, IndexMode};
pub use element::{ClosedElement, Property, SyntheticElement};
pub use sink::{GraphSink, ListItem, Sink, SinkError, Statement};
pub use text::TextSink;

use builder::TreeBuilder;
use dispatch::SinkDispatcher;

/// Converts a whole document, returning the finalized sink.
///
/// The consumer thread is always joined before this function returns,
/// whether the conversion succeeded or not.
pub fn convert<R, S>(config: &Config, input: R, sink: S) -> Result<S, Error>
where
    R: BufRead,
    S: Sink + Send + 'static,
{
    let mut dispatcher = SinkDispatcher::spawn(sink, config.queue_capacity())?;

    let parsed = {
        let mut builder = TreeBuilder::new(config, &mut dispatcher);
        xml::parse(input, &mut builder)
    };

    match parsed {
        Ok(()) => dispatcher.finish(),
        Err(error) => Err(dispatcher.abort(error)),
    }
}

/// Converts an in-memory document.
pub fn convert_str<S>(config: &Config, input: &str, sink: S) -> Result<S, Error>
where
    S: Sink + Send + 'static,
{
    convert(config, input.as_bytes(), sink)
}

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("Configuration error: {_0}")]
    Config(ConfigError),

    #[display("IRI parse error: `{iri}`")]
    #[from(ignore)]
    IriParseError {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("XML parse error at byte {position}: {source}")]
    #[from(ignore)]
    Xml {
        source: quick_xml::Error,
        position: u64,
    },

    #[display("Unknown namespace prefix `{prefix}` at /{path}")]
    #[from(ignore)]
    UnknownPrefix { prefix: String, path: String },

    #[display("Invalid name `{name}` at /{path}")]
    #[from(ignore)]
    InvalidName { name: String, path: String },

    #[display(
        "Composite identifier for <{element_type}> at /{path} is incomplete, missing: {}",
        missing.join(", ")
    )]
    #[from(ignore)]
    UnresolvedCompositeId {
        element_type: String,
        path: String,
        missing: Vec<String>,
    },

    #[display("Document ended inside open elements: /{path}")]
    #[from(ignore)]
    UnclosedElements { path: String },

    #[display("Unbalanced end of element")]
    #[from(ignore)]
    UnbalancedEndElement,

    #[display("Sink error: {_0}")]
    Sink(SinkError),

    /// The consumer thread stopped accepting statements. The dispatcher
    /// replaces this with the consumer's own error once it has been joined.
    #[display("The sink consumer stopped unexpectedly")]
    #[from(ignore)]
    ConsumerGone,
}

/// Terms introduced by the conversion itself.
pub mod vocab {
    pub static HAS_CHILD: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("https://w3id.org/xml2rdf#hasChild");

    pub static HAS_VALUE: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("https://w3id.org/xml2rdf#hasValue");

    pub static INDEX: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("https://w3id.org/xml2rdf#index");

    pub static HAS_MIXED_CONTENT: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("https://w3id.org/xml2rdf#hasMixedContent");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_sink_errors_convert() {
        let err: Error = ConfigError::ZeroQueueCapacity.into();
        assert!(matches!(err, Error::Config(ConfigError::ZeroQueueCapacity)));

        let err: Error = SinkError::from(std::io::Error::other("full")).into();
        assert!(matches!(err, Error::Sink(SinkError::Io(_))));
    }
}
