//! Plain-text output, one statement per line.
//!
//! ```text
//! _:0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://t/A> .
//! _:0 <http://t/name> """Bob""" .
//! _:0 <http://t/age> """42"""^^<http://www.w3.org/2001/XMLSchema#integer> .
//! ```

use std::io::{BufWriter, Write};

use curie::PrefixMapping;
use oxrdf::vocab::xsd;
use oxrdf::{LiteralRef, NamedNodeRef, NamedOrBlankNodeRef};

use crate::sink::{Sink, SinkError};

pub struct TextSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Returns the underlying writer, flushing anything still buffered.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))
    }

    fn write_node(&mut self, node: NamedOrBlankNodeRef<'_>) -> std::io::Result<()> {
        match node {
            NamedOrBlankNodeRef::NamedNode(n) => write!(self.writer, "<{}>", n.as_str()),
            NamedOrBlankNodeRef::BlankNode(b) => write!(self.writer, "_:{}", b.as_str()),
        }
    }
}

/// Escapes a literal body for the triple-quoted form.
pub(crate) fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

impl<W: Write> Sink for TextSink<W> {
    fn create_triple(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: NamedOrBlankNodeRef<'_>,
    ) -> Result<(), SinkError> {
        self.write_node(subject)?;
        write!(self.writer, " <{}> ", predicate.as_str())?;
        self.write_node(object)?;
        self.writer.write_all(b" .\n")?;
        Ok(())
    }

    fn create_triple_literal(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        literal: LiteralRef<'_>,
    ) -> Result<(), SinkError> {
        self.write_node(subject)?;
        write!(
            self.writer,
            " <{}> \"\"\"{}\"\"\"",
            predicate.as_str(),
            escape_literal(literal.value())
        )?;

        let datatype = literal.datatype();
        if literal.language().is_none() && datatype != xsd::STRING {
            write!(self.writer, "^^<{}>", datatype.as_str())?;
        }

        self.writer.write_all(b" .\n")?;
        Ok(())
    }

    fn end_of_stream(&mut self, _prefixes: &PrefixMapping) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::vocab::rdf;
    use oxrdf::{BlankNode, Literal, NamedNode};

    use super::*;

    #[test]
    fn escapes_backslashes_and_quotes() {
        assert_eq!(escape_literal(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_literal("plain"), "plain");
    }

    #[test]
    fn writes_statements() {
        let mut sink = TextSink::new(Vec::new());
        let bnode = BlankNode::new_unchecked("0");
        let iri = NamedNode::new_unchecked("http://t/A");
        sink.create_triple(bnode.as_ref().into(), rdf::TYPE, iri.as_ref().into())
            .unwrap();
        sink.create_triple_literal(
            iri.as_ref().into(),
            NamedNodeRef::new_unchecked("http://t/name"),
            Literal::new_simple_literal("say \"hi\"").as_ref(),
        )
        .unwrap();
        sink.create_triple_literal(
            bnode.as_ref().into(),
            NamedNodeRef::new_unchecked("http://t/age"),
            Literal::new_typed_literal("42", oxrdf::vocab::xsd::INTEGER).as_ref(),
        )
        .unwrap();
        sink.end_of_stream(&PrefixMapping::default()).unwrap();

        let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        pretty_assertions::assert_eq!(
            output,
            concat!(
                "_:0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://t/A> .\n",
                "<http://t/A> <http://t/name> \"\"\"say \\\"hi\\\"\"\"\" .\n",
                "_:0 <http://t/age> \"\"\"42\"\"\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n",
            )
        );
    }
}
