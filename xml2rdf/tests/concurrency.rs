use std::sync::Arc;

use oxrdf::{LiteralRef, NamedNodeRef, NamedOrBlankNodeRef};
use xml2rdf::{AppliesTo, Config, Error, GraphSink, Sink, SinkError};

fn config() -> Arc<Config> {
    Arc::new(
        Config::builder()
            .override_namespace("http://t/", AppliesTo::BothElementsAndAttributes)
            .auto_detect_literal_properties()
            .queue_capacity(4)
            .build()
            .unwrap(),
    )
}

fn document(items: usize) -> String {
    let mut xml = String::from("<list>");
    for i in 0..items {
        xml.push_str(&format!(r#"<item n="{i}"><name>item {i}</name><note>x</note></item>"#));
    }
    xml.push_str("</list>");
    xml
}

#[test]
fn parallel_conversions_agree() {
    let config = config();
    let xml = document(200);

    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let config = config.clone();
                let xml = &xml;
                scope.spawn(move || {
                    xml2rdf::convert_str(&config, xml, GraphSink::new())
                        .unwrap()
                        .graph()
                        .len()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // per item: type, link, attribute, two literals
    assert!(counts.iter().all(|&c| c == 1 + 200 * 5), "{counts:?}");
}

#[test]
fn failures_do_not_disturb_other_conversions() {
    let config = config();
    let good = document(50);
    let bad = format!("{}<unclosed>", &good[..good.len() - "</list>".len()]);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let config = config.clone();
                let xml = if i % 2 == 0 { good.clone() } else { bad.clone() };
                scope.spawn(move || xml2rdf::convert_str(&config, &xml, GraphSink::new()))
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(result.unwrap().graph().len(), 1 + 50 * 5);
            } else {
                assert!(result.is_err());
            }
        }
    });
}

/// Fails after accepting a fixed number of triples.
struct FlakySink {
    remaining: usize,
}

impl FlakySink {
    fn take(&mut self) -> Result<(), SinkError> {
        if self.remaining == 0 {
            return Err(SinkError::Backend("out of space".into()));
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl Sink for FlakySink {
    fn create_triple(
        &mut self,
        _: NamedOrBlankNodeRef<'_>,
        _: NamedNodeRef<'_>,
        _: NamedOrBlankNodeRef<'_>,
    ) -> Result<(), SinkError> {
        self.take()
    }

    fn create_triple_literal(
        &mut self,
        _: NamedOrBlankNodeRef<'_>,
        _: NamedNodeRef<'_>,
        _: LiteralRef<'_>,
    ) -> Result<(), SinkError> {
        self.take()
    }
}

#[test]
fn sink_failures_are_reported() {
    let err = xml2rdf::convert_str(&config(), &document(100), FlakySink { remaining: 10 })
        .err()
        .unwrap();

    assert!(
        matches!(&err, Error::Sink(SinkError::Backend(message)) if message == "out of space"),
        "{err}"
    );
}
