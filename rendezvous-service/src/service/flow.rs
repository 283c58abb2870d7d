//! Service composition: a core facade plus the runtime loops around it.

use crate::service::federation::{FederationEvents, FederationManager, FederationRuntimeConfig};
use crate::service::scheduler::AutoCloseScheduler;
use log::info;
use rendezvous_core::application::Rendezvous;
use rendezvous_core::domain::crdt::InstanceRecord;
use rendezvous_core::foundation::AUTO_CLOSE_SCAN_INTERVAL_SECS;
use rendezvous_core::infrastructure::adapters::TokenAuthority;
use rendezvous_core::infrastructure::crypto::keys::AgreementKeypair;
use rendezvous_core::infrastructure::transport::FederationTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything the federation runtime needs beyond the facade.
pub struct FederationSetup {
    pub instance: InstanceRecord,
    pub agreement: AgreementKeypair,
    pub transport: Arc<dyn FederationTransport>,
    pub token_authority: Arc<dyn TokenAuthority>,
    pub config: FederationRuntimeConfig,
    pub peers: Vec<String>,
}

pub struct ServiceFlow {
    facade: Arc<Rendezvous>,
    federation: Option<Arc<FederationManager>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl ServiceFlow {
    /// Start the scheduler and, when a federation setup is provided, the
    /// federation runtime.
    pub fn serve(facade: Arc<Rendezvous>, federation: Option<FederationSetup>) -> (Self, Option<FederationEvents>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        let privacy = &facade.config().privacy_delay;
        let scheduler = AutoCloseScheduler::new(
            Arc::clone(&facade),
            Duration::from_secs(AUTO_CLOSE_SCAN_INTERVAL_SECS),
            (privacy.min_secs, privacy.max_secs),
        );
        handles.push(scheduler.spawn(shutdown_rx.clone()));

        let mut events = None;
        let federation = federation.map(|setup| {
            let (manager, streams) = FederationManager::new(
                setup.instance,
                setup.agreement,
                Arc::clone(&facade),
                setup.transport,
                setup.token_authority,
                setup.config,
            );
            handles.extend(manager.spawn(setup.peers, shutdown_rx));
            events = Some(streams);
            manager
        });

        info!("service flow started federation={}", federation.is_some());
        (Self { facade, federation, shutdown_tx, handles }, events)
    }

    pub fn facade(&self) -> &Arc<Rendezvous> {
        &self.facade
    }

    pub fn federation(&self) -> Option<&Arc<FederationManager>> {
        self.federation.as_ref()
    }

    /// Signal every loop and wait for them to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("service flow stopped");
    }
}
