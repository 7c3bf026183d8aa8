use std::io::{self, Write};

use env_logger::Builder;
use log::LevelFilter;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch,
    },
};

use crate::config;
use crate::core::error::AppResult;

/// Initializes stderr logging at info unless `RUST_LOG` says otherwise.
pub fn init_stderr_logger() {
    Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender.send(data).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `log` records into a file through a channel so logging call sites
/// never wait on disk.
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    pub fn init_env_logger(&self) {
        let writer = self.create_async_writer();
        Builder::from_env(env_logger::Env::default())
            .filter(None, LevelFilter::Info)
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .init();
    }

    /// Drains buffered records into the log file until `shutdown` flips to
    /// true or every writer is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        // Only the pipe target keeps a sender alive from here on.
        drop(self.sender);

        let log_file_path = &self.config.path;
        if let Some(parent) = std::path::Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() && metadata(parent).await.is_err() {
                create_dir_all(parent).await?;
            }
        }

        let mut file = BufWriter::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(log_file_path)
                .await?,
        );

        loop {
            tokio::select! {
                biased;
                // Shutdown signal handling
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {}", e);
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Keep whatever was logged before the shutdown signal.
        while let Ok(data) = self.receiver.try_recv() {
            file.write_all(&data).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
