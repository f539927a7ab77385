//! PCMM policy server daemon
//!
//! Listens for PEP (CMTS) connections on the COPS well-known port, runs
//! the Client-Open handshake for each, and services gate-control request
//! state until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use pcmm_pdpd::agent::PdpAgent;
use pcmm_pdpd::config::PdpConfig;
use pcmm_pdpd::policy::LoggingPolicyHandler;

use cops_stack::transport::CopsListener;

async fn accept_loop(agent: Arc<PdpAgent>, listener: CopsListener, pool: Arc<tokio::sync::Semaphore>) {
    loop {
        let permit = match pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        match agent.accept(&listener).await {
            Ok(session) => {
                let pep_id = session.connection.pep_id().clone();
                let (_connection, _sender, handle, task) = session.spawn();
                log::info!("PEP {pep_id} session started with handle {handle}");
                tokio::spawn(async move {
                    let _permit = permit;
                    match task.await {
                        Ok(Ok(())) => log::info!("PEP {pep_id} session ended"),
                        Ok(Err(e)) => log::warn!("PEP {pep_id} session failed: {e}"),
                        Err(e) => log::warn!("PEP {pep_id} session task aborted: {e}"),
                    }
                });
            }
            Err(e) => {
                log::warn!("PEP handshake failed: {e}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("PCMM PDP v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let config = PdpConfig::from_env();
    log::info!(
        "PDP config: port={}, ka_timer={}s, acct_timer={}s, gate_timeout={:?}, pool={}",
        config.port,
        config.ka_timer_secs,
        config.acct_timer_secs,
        config.gate_timeout,
        config.pep_pool_size
    );

    let listener = CopsListener::bind(([0, 0, 0, 0], config.port).into())
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    log::info!("Listening for PEP connections on port {}", config.port);

    let handler = Arc::new(LoggingPolicyHandler);
    let agent = Arc::new(PdpAgent::new(config.clone(), handler));
    let pool = Arc::new(tokio::sync::Semaphore::new(config.pep_pool_size));

    let acceptor = tokio::spawn(accept_loop(agent, listener, pool));

    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(500));
    loop {
        interval.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
    }

    log::info!("Shutting down...");
    acceptor.abort();
    log::info!("PCMM PDP stopped");
    Ok(())
}
