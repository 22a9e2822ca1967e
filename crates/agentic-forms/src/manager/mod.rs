//! Debounced, rate-limited re-extraction driven by document mutations.
//!
//! [`ExtractionManager`] is a handle to an actor task spawned with
//! [`tokio::task::spawn_local`]; create it from inside a
//! [`tokio::task::LocalSet`]. The actor owns a [`Scheduler`] and decides
//! when a pass starts, runs the pass on its own local task, and delivers
//! one [`ExtractionMessage`] per completed pass to the [`SchemaConsumer`].

pub mod mutation;
pub mod scheduler;

pub use mutation::{is_relevant, MutatedNode, MutationKind, MutationRecord};
pub use scheduler::{Attempt, Deadline, Scheduler, SchedulerStatus};

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::extractor::ExtractionTask;
use crate::types::{ExtractedFormSchema, FormsError, FormsResult, Trigger};

/// Outbound result of one completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionMessage {
    FormsExtracted {
        schema: ExtractedFormSchema,
        trigger: Trigger,
    },
    ExtractionFailed {
        error: String,
        trigger: Trigger,
    },
}

impl ExtractionMessage {
    pub fn trigger(&self) -> Trigger {
        match self {
            ExtractionMessage::FormsExtracted { trigger, .. }
            | ExtractionMessage::ExtractionFailed { trigger, .. } => *trigger,
        }
    }
}

/// Receives extraction results. Errors are logged by the manager and
/// otherwise ignored.
#[async_trait(?Send)]
pub trait SchemaConsumer {
    async fn deliver(&self, message: ExtractionMessage) -> anyhow::Result<()>;
}

/// Forwards messages into an unbounded channel.
pub struct ChannelConsumer {
    sender: mpsc::UnboundedSender<ExtractionMessage>,
}

impl ChannelConsumer {
    pub fn new(sender: mpsc::UnboundedSender<ExtractionMessage>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExtractionMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

#[async_trait(?Send)]
impl SchemaConsumer for ChannelConsumer {
    async fn deliver(&self, message: ExtractionMessage) -> anyhow::Result<()> {
        self.sender
            .send(message)
            .map_err(|_| anyhow::anyhow!("schema consumer channel closed"))
    }
}

/// Status reported by the manager.
pub type ManagerStatus = SchedulerStatus;

type ExtractReply = oneshot::Sender<FormsResult<Option<ExtractedFormSchema>>>;

enum Command {
    Mutations(Vec<MutationRecord>),
    Visibility(bool),
    Start,
    Stop,
    Extract(ExtractReply),
    Status(oneshot::Sender<ManagerStatus>),
}

/// Handle to the extraction actor. Dropping every handle stops the actor.
#[derive(Clone)]
pub struct ExtractionManager {
    commands: mpsc::UnboundedSender<Command>,
}

impl ExtractionManager {
    /// Spawn the actor on the current `LocalSet`.
    pub fn spawn(
        task: Rc<dyn ExtractionTask>,
        consumer: Rc<dyn SchemaConsumer>,
        config: SchedulerConfig,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let actor = Actor {
            scheduler: Scheduler::new(config),
            task,
            consumer,
            commands: receiver,
            done_tx,
            done_rx,
        };
        tokio::task::spawn_local(actor.run());
        Self { commands }
    }

    fn send(&self, command: Command) -> FormsResult<()> {
        self.commands
            .send(command)
            .map_err(|_| FormsError::ManagerClosed)
    }

    /// Report a mutation batch from the host.
    pub fn observe_mutations(&self, records: Vec<MutationRecord>) -> FormsResult<()> {
        self.send(Command::Mutations(records))
    }

    /// Page visibility changed. Hidden pages stop observing.
    pub fn set_visibility(&self, visible: bool) -> FormsResult<()> {
        self.send(Command::Visibility(visible))
    }

    pub fn start_observing(&self) -> FormsResult<()> {
        self.send(Command::Start)
    }

    pub fn stop_observing(&self) -> FormsResult<()> {
        self.send(Command::Stop)
    }

    /// Run a pass now. `Ok(None)` when a guard dropped the request.
    pub async fn extract_now(&self) -> FormsResult<Option<ExtractedFormSchema>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Extract(reply))?;
        response.await.map_err(|_| FormsError::ManagerClosed)?
    }

    pub async fn status(&self) -> FormsResult<ManagerStatus> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status(reply))?;
        response.await.map_err(|_| FormsError::ManagerClosed)
    }
}

struct Actor {
    scheduler: Scheduler,
    task: Rc<dyn ExtractionTask>,
    consumer: Rc<dyn SchemaConsumer>,
    commands: mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<()>,
    done_rx: mpsc::UnboundedReceiver<()>,
}

impl Actor {
    async fn run(mut self) {
        debug!(observing = self.scheduler.is_observing(), "Extraction manager started");
        loop {
            let debounce = self.scheduler.debounce_deadline();
            let max_delay = self.scheduler.max_deadline();

            // A finished pass is recorded before any queued command sees the state.
            tokio::select! {
                biased;
                Some(()) = self.done_rx.recv() => self.scheduler.finish(),
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = sleep_until_opt(debounce) => {
                    let attempt = self.scheduler.on_deadline(Deadline::Debounce, Instant::now());
                    self.launch(attempt, Trigger::MutationObserver, None);
                }
                _ = sleep_until_opt(max_delay) => {
                    let attempt = self.scheduler.on_deadline(Deadline::MaxDelay, Instant::now());
                    self.launch(attempt, Trigger::MutationObserver, None);
                }
            }
        }
        debug!("Extraction manager stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Mutations(records) => {
                if self.scheduler.on_mutations(&records, now) {
                    debug!(records = records.len(), "Mutation batch armed extraction timers");
                }
            }
            Command::Visibility(visible) => {
                debug!(visible, "Page visibility changed");
                self.scheduler.set_visible(visible);
            }
            Command::Start => self.scheduler.start_observing(),
            Command::Stop => self.scheduler.stop_observing(),
            Command::Extract(reply) => {
                let attempt = self.scheduler.force(now);
                self.launch(attempt, Trigger::Manual, Some(reply));
            }
            Command::Status(reply) => {
                let _ = reply.send(self.scheduler.status(now));
            }
        }
    }

    fn launch(&mut self, attempt: Attempt, trigger: Trigger, reply: Option<ExtractReply>) {
        if attempt != Attempt::Begin {
            debug!(?attempt, %trigger, "Extraction attempt dropped");
            if let Some(reply) = reply {
                let _ = reply.send(Ok(None));
            }
            return;
        }

        info!(%trigger, "Starting extraction pass");
        let task = Rc::clone(&self.task);
        let consumer = Rc::clone(&self.consumer);
        let done = self.done_tx.clone();

        tokio::task::spawn_local(async move {
            let result = task.extract(trigger).await;
            let message = match &result {
                Ok(schema) => ExtractionMessage::FormsExtracted {
                    schema: schema.clone(),
                    trigger,
                },
                Err(e) => {
                    warn!(%trigger, "Extraction failed: {e}");
                    ExtractionMessage::ExtractionFailed {
                        error: e.to_string(),
                        trigger,
                    }
                }
            };
            if let Err(e) = consumer.deliver(message).await {
                warn!("Failed to deliver extraction result: {e:#}");
            }
            if let Some(reply) = reply {
                let _ = reply.send(result.map(Some));
            }
            let _ = done.send(());
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
