//! Interaction service.
//!
//! Reads one JSON interaction per line, dispatches it on the blocking pool
//! and writes the reply back as a JSON line tagged with the interaction id.
//! The command catalogue is announced before the first interaction and
//! withdrawn after the last one.

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{watch, Mutex},
    task::JoinSet,
};
use uuid::Uuid;

use crate::{
    core::error::{AppResult, ErrorContext},
    dispatch::{commands, CommandSpec, Dispatcher, Interaction},
};

/// Messages sent back to the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Register {
        commands: Vec<CommandSpec>,
    },
    Unregister {
        commands: Vec<&'static str>,
    },
    Reply {
        id: String,
        content: String,
        ephemeral: bool,
    },
}

#[async_trait]
pub trait Responder: Send {
    async fn send(&mut self, event: &Event) -> AppResult<()>;
}

pub struct JsonLinesResponder<W> {
    writer: W,
}

impl<W> JsonLinesResponder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> Responder for JsonLinesResponder<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, event: &Event) -> AppResult<()> {
        let mut line = serde_json::to_vec(event).with_context("Failed to encode event")?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

pub struct InteractionService {
    dispatcher: Arc<Dispatcher>,
}

impl InteractionService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Serves `input` until it ends or `shutdown` flips to true. In-flight
    /// interactions are answered before the catalogue is withdrawn.
    pub async fn run<R, S>(
        &self,
        input: R,
        responder: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<S>
    where
        R: AsyncBufRead + Unpin,
        S: Responder + 'static,
    {
        let responder = Arc::new(Mutex::new(responder));
        let catalogue = commands();
        let names = catalogue.iter().map(|spec| spec.name).collect();

        responder
            .lock()
            .await
            .send(&Event::Register {
                commands: catalogue,
            })
            .await?;

        let mut input = input;
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping interactions");
                        break;
                    }
                },

                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_finished(done);
                },

                // Partial reads stay in `buf` if another branch wins.
                read = input.read_until(b'\n', &mut buf) => {
                    let eof = matches!(read, Ok(0));
                    if let Err(e) = read {
                        error!("Failed to read interaction stream: {e}");
                        break;
                    }

                    let line = std::mem::take(&mut buf);
                    if let Some(interaction) = parse_interaction(&line) {
                        in_flight.spawn(answer(
                            self.dispatcher.clone(),
                            interaction,
                            responder.clone(),
                        ));
                    }
                    if eof {
                        info!("Interaction stream closed");
                        break;
                    }
                }
            }
        }

        while let Some(done) = in_flight.join_next().await {
            log_finished(done);
        }

        info!("Removing commands...");
        responder
            .lock()
            .await
            .send(&Event::Unregister { commands: names })
            .await?;

        match Arc::try_unwrap(responder) {
            Ok(responder) => Ok(responder.into_inner()),
            Err(_) => Err(crate::internal_error!("responder still shared after shutdown")),
        }
    }
}

fn parse_interaction(line: &[u8]) -> Option<Interaction> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => {
            warn!("Skipping interaction that is not UTF-8: {e}");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Interaction>(line) {
        Ok(mut interaction) => {
            if interaction.id.is_none() {
                interaction.id = Some(Uuid::new_v4().to_string());
            }
            Some(interaction)
        }
        Err(e) => {
            warn!("Skipping malformed interaction: {e}");
            None
        }
    }
}

async fn answer<S>(
    dispatcher: Arc<Dispatcher>,
    interaction: Interaction,
    responder: Arc<Mutex<S>>,
) -> AppResult<()>
where
    S: Responder,
{
    let id = interaction.id.clone().unwrap_or_default();
    let reply = tokio::task::spawn_blocking(move || dispatcher.dispatch(&interaction))
        .await
        .with_context("Dispatch task failed")?;

    responder
        .lock()
        .await
        .send(&Event::Reply {
            id,
            content: reply.content,
            ephemeral: reply.ephemeral,
        })
        .await
}

fn log_finished(done: Result<AppResult<()>, tokio::task::JoinError>) {
    match done {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Failed to answer interaction: {e}"),
        Err(e) => log::error!("Interaction task aborted: {e}"),
    }
}
