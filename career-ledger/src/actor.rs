//! Single-writer actor around a [`Ledger`]
//!
//! The ledger itself is plain data mutated through `&mut self`. When host
//! notifications, presentation reads and saves come from different tasks,
//! this actor serializes them onto one tokio task:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │      Host adapter / presentation / autosave           │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   Ledger + CurrencyHost + optional SaveStore          │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    host::{CurrencyHost, HostEvent},
    ledger::{Ledger, LedgerSummary},
    storage::SaveStore,
    transaction::{Transaction, TransactionSorter},
    types::Resource,
    Error, Result,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Host shared with the actor task
pub type SharedHost = Arc<dyn CurrencyHost + Send + Sync>;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply a host notification
    Event(HostEvent),

    /// Get an overview of the ledger
    GetSummary {
        response: oneshot::Sender<LedgerSummary>,
    },

    /// Get a sorted snapshot, optionally filtered to one resource
    GetSnapshot {
        resource: Option<Resource>,
        sorter: TransactionSorter,
        response: oneshot::Sender<Vec<Transaction>>,
    },

    /// Reload the ledger from the save store
    Load {
        response: oneshot::Sender<Result<bool>>,
    },

    /// Write the ledger to the save store
    Save {
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor, saving first when a store is attached
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns the ledger
pub struct LedgerActor {
    ledger: Ledger,
    host: SharedHost,
    store: Option<SaveStore>,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        ledger: Ledger,
        host: SharedHost,
        store: Option<SaveStore>,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            ledger,
            host,
            store,
            mailbox,
        }
    }

    /// Run the actor loop until shutdown or until every handle is dropped
    pub async fn run(mut self) -> Ledger {
        while let Some(msg) = self.mailbox.recv().await {
            if self.handle_message(msg).is_break() {
                return self.ledger;
            }
        }

        if let Err(e) = self.save() {
            tracing::error!("Error saving ledger after mailbox closed: {}", e);
        }
        self.ledger
    }

    /// Apply one message; `Break` stops the actor
    fn handle_message(&mut self, msg: LedgerMessage) -> ControlFlow<()> {
        match msg {
            LedgerMessage::Event(event) => {
                self.ledger.handle_event(self.host.as_ref(), &event);
            }

            LedgerMessage::GetSummary { response } => {
                let _ = response.send(self.ledger.summary());
            }

            LedgerMessage::GetSnapshot {
                resource,
                sorter,
                response,
            } => {
                let _ = response.send(self.ledger.sorted(resource, sorter));
            }

            LedgerMessage::Load { response } => {
                let result = match &self.store {
                    Some(store) => store.load_into(&mut self.ledger, self.host.as_ref()),
                    None => Ok(false),
                };
                let _ = response.send(result);
            }

            LedgerMessage::Save { response } => {
                let _ = response.send(self.save());
            }

            LedgerMessage::Shutdown { response } => {
                let result = self.save();
                if let Err(e) = &result {
                    tracing::error!("Error saving ledger on shutdown: {}", e);
                }
                let _ = response.send(result);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn save(&mut self) -> Result<()> {
        match &self.store {
            Some(store) => store.save_from(&mut self.ledger),
            None => Ok(()),
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn send(&self, msg: LedgerMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Deliver a host notification
    pub async fn notify(&self, event: HostEvent) -> Result<()> {
        self.send(LedgerMessage::Event(event)).await
    }

    /// Get an overview of the ledger
    pub async fn summary(&self) -> Result<LedgerSummary> {
        self.request(|response| LedgerMessage::GetSummary { response })
            .await
    }

    /// Get a sorted snapshot of the ledger or one resource view
    pub async fn snapshot(
        &self,
        resource: Option<Resource>,
        sorter: TransactionSorter,
    ) -> Result<Vec<Transaction>> {
        self.request(|response| LedgerMessage::GetSnapshot {
            resource,
            sorter,
            response,
        })
        .await
    }

    /// Reload from the save store; `false` if there was nothing to load
    pub async fn load(&self) -> Result<bool> {
        self.request(|response| LedgerMessage::Load { response })
            .await?
    }

    /// Write to the save store
    pub async fn save(&self) -> Result<()> {
        self.request(|response| LedgerMessage::Save { response })
            .await?
    }

    /// Save (when a store is attached) and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await?
    }
}

/// Spawn the ledger actor
///
/// The returned join handle yields the ledger once the actor stops.
pub fn spawn_ledger_actor(
    ledger: Ledger,
    host: SharedHost,
    store: Option<SaveStore>,
    mailbox_capacity: usize,
) -> (LedgerHandle, tokio::task::JoinHandle<Ledger>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, host, store, rx);

    let join = tokio::spawn(actor.run());

    (LedgerHandle::new(tx), join)
}
