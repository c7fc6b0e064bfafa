//! The bounded queue between statement production and the sink.
//!
//! Each conversion owns one [`SinkDispatcher`]: a `sync_channel` and one
//! consumer thread draining it into the sink. Sending blocks while the queue
//! is full, which bounds memory regardless of how fast the sink is.

use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::JoinHandle;

use curie::PrefixMapping;

use crate::Error;
use crate::sink::{Sink, SinkError, Statement};

#[derive(Debug)]
pub(crate) enum Message {
    Statement(Statement),
    Prefix { prefix: String, namespace: String },
    EndOfStream,
}

/// Where the tree builder sends its output.
pub(crate) trait Output {
    fn put(&mut self, message: Message) -> Result<(), Error>;
}

pub struct SinkDispatcher<S> {
    sender: Option<SyncSender<Message>>,
    consumer: Option<JoinHandle<Result<S, SinkError>>>,
}

impl<S: Sink + Send + 'static> SinkDispatcher<S> {
    /// Starts the consumer thread.
    pub fn spawn(sink: S, capacity: usize) -> Result<Self, Error> {
        let (sender, receiver) = std::sync::mpsc::sync_channel(capacity);
        let consumer = std::thread::Builder::new()
            .name("xml2rdf-sink".into())
            .spawn(move || consume(sink, receiver))
            .map_err(SinkError::Io)?;

        tracing::debug!(capacity, "sink consumer started");
        Ok(Self {
            sender: Some(sender),
            consumer: Some(consumer),
        })
    }

    /// Signals the end of the stream and waits for the sink to finalize.
    pub fn finish(mut self) -> Result<S, Error> {
        if let Err(error) = self.put(Message::EndOfStream) {
            return Err(self.abort(error));
        }

        self.sender = None;
        self.join()
    }

    /// Stops the consumer without finalizing the sink and joins it.
    ///
    /// If the producer failed because the consumer had already stopped, the
    /// consumer's own error is returned instead of `error`.
    pub fn abort(mut self, error: Error) -> Error {
        self.sender = None;
        match (error, self.join()) {
            (Error::ConsumerGone, Err(consumer_error)) => consumer_error,
            (error, _) => error,
        }
    }

    fn join(&mut self) -> Result<S, Error> {
        let Some(consumer) = self.consumer.take() else {
            return Err(Error::ConsumerGone);
        };

        let result = match consumer.join() {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(SinkError::Backend("sink consumer panicked".into()).into()),
        };
        tracing::debug!(ok = result.is_ok(), "sink consumer joined");
        result
    }
}

impl<S> Output for SinkDispatcher<S> {
    fn put(&mut self, message: Message) -> Result<(), Error> {
        let sender = self.sender.as_ref().ok_or(Error::ConsumerGone)?;
        sender.send(message).map_err(|_| Error::ConsumerGone)
    }
}

impl<S> Drop for SinkDispatcher<S> {
    fn drop(&mut self) {
        // disconnect first so that the consumer can observe it
        self.sender = None;
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }
    }
}

fn consume<S: Sink>(mut sink: S, receiver: Receiver<Message>) -> Result<S, SinkError> {
    let mut prefixes = PrefixMapping::default();
    let mut count = 0usize;
    loop {
        match receiver.recv() {
            Ok(Message::Statement(statement)) => {
                statement.apply(&mut sink)?;
                count += 1;
            }
            Ok(Message::Prefix { prefix, namespace }) => {
                if prefix.is_empty() {
                    prefixes.set_default(&namespace);
                } else if let Err(err) = prefixes.add_prefix(&prefix, &namespace) {
                    tracing::warn!(%prefix, %namespace, ?err, "ignoring prefix");
                }
            }
            Ok(Message::EndOfStream) => {
                sink.end_of_stream(&prefixes)?;
                tracing::debug!(statements = count, "sink finalized");
                return Ok(sink);
            }
            Err(std::sync::mpsc::RecvError) => {
                tracing::debug!(statements = count, "producer disconnected");
                return Err(SinkError::Interrupted);
            }
        }
    }
}
