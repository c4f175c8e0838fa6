use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// One record as the relay re-broadcasts it inside a `data:` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayedEvent {
    pub event: String,
    pub id: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub relayed: RelayedEvent,
    pub timestamp: Instant,
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    pings: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, label: String) -> Result<Self> {
        let url = format!("{}/stream", base_url);
        let (tx, rx) = mpsc::unbounded_channel();
        let pings = Arc::new(AtomicUsize::new(0));

        let client = es::ClientBuilder::for_url(&url)?.build();

        let task_label = label.clone();
        let task_pings = Arc::clone(&pings);
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        match serde_json::from_str::<RelayedEvent>(&event.data) {
                            Ok(relayed) => {
                                let event = Event {
                                    relayed,
                                    timestamp: Instant::now(),
                                };
                                if tx.send(event).is_err() {
                                    debug!("SSE receiver dropped for {}", task_label);
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Unexpected frame for {}: {} ({})", task_label, event.data, e);
                            }
                        }
                    }
                    Some(Ok(es::SSE::Comment(comment))) => {
                        trace!("Comment for {}: {}", task_label, comment);
                        task_pings.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(Err(e)) => {
                        warn!("SSE error for {}: {}", task_label, e);
                    }
                    None => {
                        debug!("SSE stream ended for {}", task_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            pings,
            handle,
        })
    }

    /// Keep-alive comments seen so far on this connection.
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::Relaxed)
    }

    pub async fn wait_for_event(&mut self, timeout: Duration) -> Result<Event> {
        match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => anyhow::bail!("SSE connection closed"),
            Err(_) => anyhow::bail!("Timeout waiting for a relayed event"),
        }
    }

    /// Stop reading the stream, which closes the HTTP connection to the relay.
    pub fn close(self) {
        self.handle.abort();
    }
}
