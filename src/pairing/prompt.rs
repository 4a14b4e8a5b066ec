//! Where the number to pair with comes from.

use crate::error::PairingError;
use crate::Result;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

type LineReceiver = oneshot::Receiver<io::Result<Option<String>>>;

/// Source of the phone number to pair with.
#[async_trait]
pub trait PhonePrompt: Send + Sync {
    async fn phone_number(&self) -> Result<String>;

    /// Show the code the operator types into the phone (Linked devices).
    fn show_pairing_code(&self, code: &str) {
        tracing::info!(code, "pairing code issued, enter it on the phone");
    }
}

/// Asks the operator on the terminal, one line from stdin.
///
/// The read runs on its own thread, so dropping the future (shutdown, abort)
/// never waits for the operator.
pub struct StdinPrompt {
    question: String,
}

impl StdinPrompt {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new("\nEnter your WhatsApp number:\n=> ")
    }
}

#[async_trait]
impl PhonePrompt for StdinPrompt {
    async fn phone_number(&self) -> Result<String> {
        ask(&self.question).map_err(|e| PairingError::Prompt(e.to_string()))?;
        let line = read_line_detached(io::BufReader::new(io::stdin()))?
            .await
            .map_err(|_| PairingError::Prompt("stdin reader stopped".into()))?
            .map_err(|e| PairingError::Prompt(e.to_string()))?;
        line.ok_or_else(|| PairingError::Prompt("stdin closed".into()).into())
    }

    fn show_pairing_code(&self, code: &str) {
        println!("Your pairing code: {code}");
    }
}

fn ask(question: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()
}

/// Read one trimmed line from `reader` on a dedicated thread. `None` at EOF.
///
/// The thread is detached: if the receiver is dropped, the line is discarded
/// whenever the read eventually returns.
fn read_line_detached<R>(mut reader: R) -> Result<LineReceiver>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-prompt".into())
        .spawn(move || {
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .map(|n| (n > 0).then(|| line.trim().to_string()));
            let _ = tx.send(read);
        })
        .map_err(|e| PairingError::Prompt(e.to_string()))?;
    Ok(rx)
}

/// Fixed number from configuration, for hosts without a terminal.
pub struct PresetPrompt(pub String);

#[async_trait]
impl PhonePrompt for PresetPrompt {
    async fn phone_number(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Reader that blocks until its sender is dropped, like an idle terminal.
    struct IdleTerminal(mpsc::Receiver<()>);

    impl Read for IdleTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn preset_returns_number() {
        let prompt = PresetPrompt("+15550001234".into());
        assert_eq!(prompt.phone_number().await.unwrap(), "+15550001234");
    }

    #[tokio::test]
    async fn reads_one_trimmed_line() {
        let rx = read_line_detached(Cursor::new("  +15550001234\r\nignored\n")).unwrap();
        assert_eq!(rx.await.unwrap().unwrap().as_deref(), Some("+15550001234"));

        let rx = read_line_detached(Cursor::new("")).unwrap();
        assert_eq!(rx.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn pending_read_can_be_dropped() {
        let (release, idle) = mpsc::channel();
        let rx = read_line_detached(io::BufReader::new(IdleTerminal(idle))).unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(50), rx).await;
        assert!(waited.is_err());
        // The receiver is gone with the timeout; releasing the reader must not panic.
        drop(release);
    }

    #[test]
    fn runtime_shutdown_does_not_wait_for_the_operator() {
        let (release, idle) = mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let task = runtime.spawn(async move {
            let rx = read_line_detached(io::BufReader::new(IdleTerminal(idle))).unwrap();
            rx.await
        });
        task.abort();
        let started = std::time::Instant::now();
        runtime.shutdown_timeout(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release);
    }
}
