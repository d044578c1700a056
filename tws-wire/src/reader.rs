//! Dispatcher task.
//!
//! Spawns a tokio task that owns the read half of the session, decodes
//! server messages as they become complete, and forwards the resulting
//! `IBEvent`s over the event channel in wire order.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decoder::decode_server_msg;
use crate::errors::IBApiError;
use crate::protocol::client_errors::{NO_VALID_ID, UNKNOWN_ID};
use crate::protocol::NUL;
use crate::transport::TransportReader;
use crate::wrapper::IBEvent;

// ============================================================================
// MessageReader
// ============================================================================

/// How the read loop ended.
#[derive(Debug, PartialEq)]
enum Exit {
    /// The server closed the stream between messages.
    Closed,
    /// The event receiver is gone.
    ReceiverDropped,
    /// Read fault, malformed message or unknown tag; the event is reported
    /// before the session is torn down.
    Fault(IBEvent),
}

/// Reads and dispatches server messages until the session ends.
///
/// ```rust,ignore
/// let (transport_reader, transport_writer) = transport.into_split();
/// let reader = MessageReader::new(transport_reader, server_version, events_tx);
/// let handle = reader.spawn(move || async move { inner.connection_lost(generation).await });
/// ```
pub struct MessageReader {
    transport_reader: TransportReader,
    server_version: i32,
    events: mpsc::UnboundedSender<IBEvent>,
}

impl MessageReader {
    pub fn new(
        transport_reader: TransportReader,
        server_version: i32,
        events: mpsc::UnboundedSender<IBEvent>,
    ) -> Self {
        Self {
            transport_reader,
            server_version,
            events,
        }
    }

    /// Spawn the dispatcher task.
    ///
    /// `on_closed` runs once when the loop ends on its own (end of stream,
    /// fault, or dropped receiver); it is responsible for tearing the session
    /// down and announcing `ConnectionClosed`. It does not run when the task
    /// is aborted.
    pub fn spawn<F, Fut>(self, on_closed: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tracing::debug!(server_version = self.server_version, "dispatcher started");
            let events = self.events.clone();
            match self.run().await {
                Exit::Closed => tracing::info!("server closed the connection"),
                Exit::ReceiverDropped => tracing::debug!("event receiver dropped, dispatcher stopping"),
                Exit::Fault(report) => {
                    tracing::error!(?report, "dispatcher stopping on fault");
                    let _ = events.send(report);
                }
            }
            on_closed().await;
        })
    }

    async fn run(mut self) -> Exit {
        // Buffer length at the last `Incomplete`. Every message is decoded
        // from its first byte, so a retry only pays off once a new field
        // terminator has arrived; reads that add none skip the decode.
        let mut stalled_at: Option<usize> = None;
        loop {
            let retry = match stalled_at {
                Some(n) => self.transport_reader.buffered()[n..].contains(&NUL),
                None => true,
            };

            // Dispatch every complete message already buffered.
            if retry {
                loop {
                    match decode_server_msg(self.transport_reader.buffered(), self.server_version) {
                        Ok((events, used)) => {
                            self.transport_reader.consume(used);
                            for event in events {
                                if self.events.send(event).is_err() {
                                    return Exit::ReceiverDropped;
                                }
                            }
                        }
                        Err(IBApiError::Incomplete) => {
                            stalled_at = Some(self.transport_reader.buffered().len());
                            break;
                        }
                        Err(IBApiError::UnknownMessage(tag)) => {
                            tracing::error!(tag, "unknown message id");
                            return Exit::Fault(IBEvent::error(
                                NO_VALID_ID,
                                UNKNOWN_ID.code,
                                UNKNOWN_ID.msg,
                            ));
                        }
                        Err(e) => return Exit::Fault(read_error(&e)),
                    }
                }
            }

            match self.transport_reader.fill().await {
                Ok(0) if self.transport_reader.buffered().is_empty() => return Exit::Closed,
                Ok(0) => {
                    return Exit::Fault(read_error(&IBApiError::Disconnected(
                        "connection closed in the middle of a message".into(),
                    )))
                }
                Ok(_) => {}
                Err(e) => return Exit::Fault(read_error(&e)),
            }
        }
    }
}

fn read_error(e: &IBApiError) -> IBEvent {
    IBEvent::error(NO_VALID_ID, 0, format!("Error reading - {e}"))
}

// ============================================================================
// Tests
// ============================================================================
