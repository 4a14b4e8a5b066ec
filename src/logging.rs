//! Process-wide logging and the last-resort error sinks.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter. The protocol client's own chatter is off unless asked for.
pub const DEFAULT_FILTER: &str = "info,viewonce_relay::client=off";

/// Install the global subscriber. `RUST_LOG` takes precedence over `filter`.
/// A second call is a no-op.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .try_init();
}

/// Log panics through tracing, then hand over to the previous hook.
///
/// Panics inside spawned tasks only end that task; the runtime keeps going.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(%location, %message, "panic");
        previous(info);
    }));
}

/// Spawn a detached task whose error is logged instead of propagated.
pub fn spawn_logged<F, T, E>(name: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: std::fmt::Debug + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            Ok(outcome) => tracing::debug!(task = name, ?outcome, "task finished"),
            Err(e) => tracing::error!(task = name, error = %e, "task failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_errors_do_not_propagate() {
        let failed = spawn_logged("test", async { Err::<(), _>("boom") });
        assert!(failed.await.is_ok());

        let ok = spawn_logged("test", async { Ok::<_, String>(42) });
        assert!(ok.await.is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        init(DEFAULT_FILTER);
        init("debug");
    }
}
