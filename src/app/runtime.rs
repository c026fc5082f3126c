use super::MirrorApp;
use tracing::{info, warn};

#[cfg(feature = "http")]
use super::ShutdownReason;
#[cfg(feature = "http")]
use crate::{error::Result, server::ControlServer};
#[cfg(feature = "http")]
use std::sync::Arc;
#[cfg(feature = "http")]
use tokio::{
    signal,
    sync::{oneshot, Mutex},
};
#[cfg(feature = "http")]
use tracing::error;

impl MirrorApp {
    /// Seed the log, load the stored selection and take a first look at
    /// devices and service state
    pub async fn prepare(&self) {
        match self.log.ensure_exists().await {
            Ok(true) => info!("Created log file {}", self.log.path().display()),
            Ok(false) => {}
            Err(e) => warn!("{}", e),
        }

        self.surface.initialize().await;
    }

    /// Serve the control API until SIGINT or SIGTERM
    #[cfg(feature = "http")]
    pub async fn run(&self) -> Result<i32> {
        self.prepare().await;
        self.poller.mount();

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        Self::setup_signal_handlers(shutdown_sender);

        let server = ControlServer::new(
            self.config.server.clone(),
            self.surface.clone(),
            self.log.clone(),
        );

        let result = server
            .start(async move {
                match shutdown_receiver.await {
                    Ok(reason) => info!("Shutdown initiated: {:?}", reason),
                    Err(_) => warn!("Shutdown channel closed unexpectedly"),
                }
            })
            .await;

        self.poller.unmount().await;

        match result {
            Ok(()) => {
                info!("Mirrorctl shutdown complete");
                Ok(0)
            }
            Err(e) => {
                error!("Control API stopped with error: {}", e);
                Ok(1)
            }
        }
    }

    /// Set up signal handlers for graceful shutdown
    #[cfg(feature = "http")]
    fn setup_signal_handlers(shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };

                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
