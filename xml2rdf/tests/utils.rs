use itertools::Itertools;
use oxrdf::Graph;
use xml2rdf::{Config, GraphSink, TextSink};

const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("x2r", "https://w3id.org/xml2rdf#"),
    ("t", "http://t/"),
];

pub fn serialize_graph(graph: &Graph) -> String {
    // blank node labels depend on the conversion, so compare canonical forms
    let idents = rdf_canon::issue_graph_with::<sha2::Sha256>(graph, &Default::default()).unwrap();
    let graph = rdf_canon::relabel_graph(graph, &idents).unwrap();

    let mut output = Vec::new();
    let mut ttl = oxttl::TurtleSerializer::new();
    for (prefix, iri) in PREFIXES {
        ttl = ttl.with_prefix(*prefix, *iri).unwrap();
    }

    let mut ttl = ttl.for_writer(&mut output);
    for triple in graph.iter().sorted_by_cached_key(|t| {
        (
            t.subject.to_string(),
            if t.predicate.as_str() == "http://www.w3.org/1999/02/22-rdf-syntax-ns#type" {
                // make "a" come first
                None
            } else {
                Some(t.predicate.to_string())
            },
            t.object.to_string(),
        )
    }) {
        ttl.serialize_triple(triple).unwrap();
    }

    ttl.finish().unwrap();

    String::from_utf8_lossy(&output).into_owned()
}

pub fn convert(config: &Config, xml: &str) -> Graph {
    xml2rdf::convert_str(config, xml, GraphSink::new())
        .unwrap()
        .into_graph()
}

#[allow(unused)]
pub fn convert_to_text(config: &Config, xml: &str) -> String {
    let sink = xml2rdf::convert_str(config, xml, TextSink::new(Vec::new())).unwrap();
    String::from_utf8(sink.into_inner().unwrap()).unwrap()
}

#[allow(unused)]
pub fn assert_graph(config: &Config, xml: &str, ttl: &str) {
    let output_graph = convert(config, xml);

    let mut ttl_graph = Graph::new();
    {
        let header: String = PREFIXES
            .iter()
            .map(|(prefix, iri)| format!("@prefix {prefix}: <{iri}> .\n"))
            .collect();
        let ttl = header + ttl;
        let ttl_rdf = oxttl::TurtleParser::new().for_slice(ttl.as_bytes());
        for triple in ttl_rdf {
            ttl_graph.insert(&triple.unwrap());
        }
    }

    let output = serialize_graph(&output_graph);
    let ttl_output = serialize_graph(&ttl_graph);

    pretty_assertions::assert_eq!(output, ttl_output);
}
