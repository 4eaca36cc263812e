//! Stateless pub-sub for engine events
//!
//! Components subscribe by registering an async handler. Each event is handled on its own task; the handler sees
//! only the event, never engine state. The handler loop ends when every producer has been dropped, after draining
//! in-flight jobs.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(self) {
        let Self { mut listener, sender, handler } = self;
        // only subscribers keep the channel open from here on
        drop(sender);
        debug!("📬️ Starting event handler");
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                ev = listener.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ Handling event");
                        let handler = Arc::clone(&handler);
                        jobs.spawn(async move { (handler)(ev).await });
                    },
                    None => break,
                },
                Some(done) = jobs.join_next(), if !jobs.is_empty() => log_job_result(done),
            }
        }
        debug!("📬️ All producers have gone away. Waiting for {} jobs to complete", jobs.len());
        while let Some(done) = jobs.join_next().await {
            log_job_result(done);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_job_result(result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => trace!("📬️ Event handled"),
        Err(e) => warn!("📬️ An event handler task failed: {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
