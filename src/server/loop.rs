// Server loop module
// Accepts connections until shutdown, then drains the active ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use super::signal::shutdown_requested;
use crate::config::AppState;
use crate::logger;
use crate::persist;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Serve until shutdown, keeping the tally state file current.
///
/// The periodic flusher stops with the signal; the last flush runs after
/// the drain so votes from in-flight requests are saved too.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));

    let flusher = state
        .store
        .is_some()
        .then(|| tokio::spawn(persist::run_flusher(Arc::clone(&state), shutdown.clone())));

    let result = start_server_loop(
        listener,
        Arc::clone(&state),
        active_connections,
        shutdown,
    )
    .await;

    if let Some(flusher) = flusher {
        if let Err(e) = flusher.await {
            logger::log_error(&format!("[Persist] Flusher task failed: {e}"));
        }
    }
    persist::final_flush(&state).await;

    result
}

/// Run the accept loop until `shutdown` flips to `true`.
///
/// The listener is closed as soon as shutdown is requested; in-flight
/// connections get `performance.shutdown_grace` seconds to finish.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let conn_shutdown = shutdown.clone();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            conn_shutdown.clone(),
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown_requested(&mut shutdown) => break,
        }
    }

    drop(listener);
    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let remaining = drain_connections(&active_connections, grace).await;
    logger::log_shutdown_complete(remaining);
    Ok(())
}

/// Wait until no connections remain or the grace period ends; returns the leftover count
async fn drain_connections(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let count = active.load(Ordering::SeqCst);
        if count == 0 || tokio::time::Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
