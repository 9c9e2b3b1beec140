//! Line-oriented terminal access.
//!
//! Standard input is read on a dedicated thread and handed to the runtime
//! through a channel, so a pending read never holds up shutdown.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

/// Where the shell reads commands and writes output.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Shows `prompt` and waits for one line. `None` once input is closed.
    async fn read_line(&self, prompt: &str) -> Option<String>;

    fn print(&self, text: &str);
}

/// The process's standard input and output.
pub struct StdTerminal {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl StdTerminal {
    /// Starts the stdin reader thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "stdin read failed");
                            break;
                        }
                    }
                }
                tracing::debug!("stdin closed");
            })?;

        Ok(Self {
            lines: Mutex::new(rx),
        })
    }
}

#[async_trait]
impl Terminal for StdTerminal {
    async fn read_line(&self, prompt: &str) -> Option<String> {
        {
            let mut out = std::io::stdout().lock();
            // A broken stdout shows up again on the next print.
            let _ = write!(out, "{prompt}");
            let _ = out.flush();
        }
        self.lines.lock().await.recv().await
    }

    fn print(&self, text: &str) {
        println!("{text}");
    }
}
