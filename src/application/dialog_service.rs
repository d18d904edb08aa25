// Dialog service - Opens dialogs and tracks the ones still open
use crate::application::collaborators::{AliasNotifier, AuthProvider, DeviceDirectory, TelemetryGateway};
use crate::application::dialog_controller::{
    DialogController, DialogDependencies, DialogSettings, WidgetContext,
};
use crate::application::token_manager::AuthTokenManager;
use crate::domain::entity::EntityRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub type DialogId = u64;

#[derive(Clone)]
pub struct DialogService {
    devices: Arc<dyn DeviceDirectory>,
    gateway: Arc<dyn TelemetryGateway>,
    auth: Arc<dyn AuthProvider>,
    aliases: Arc<dyn AliasNotifier>,
    settings: DialogSettings,
    token_refresh: Duration,
    dialogs: Arc<RwLock<HashMap<DialogId, Arc<DialogController>>>>,
    next_id: Arc<AtomicU64>,
}

impl DialogService {
    pub fn new(
        devices: Arc<dyn DeviceDirectory>,
        gateway: Arc<dyn TelemetryGateway>,
        auth: Arc<dyn AuthProvider>,
        aliases: Arc<dyn AliasNotifier>,
        settings: DialogSettings,
        token_refresh: Duration,
    ) -> Self {
        Self {
            devices,
            gateway,
            auth,
            aliases,
            settings,
            token_refresh,
            dialogs: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Open a dialog with its own token manager. It is forgotten once closed.
    pub fn open(&self, entity: EntityRef) -> (DialogId, Arc<DialogController>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let controller = DialogController::open(
            entity,
            WidgetContext {
                aliases: self.aliases.clone(),
            },
            self.settings.clone(),
            DialogDependencies {
                devices: self.devices.clone(),
                gateway: self.gateway.clone(),
                tokens: AuthTokenManager::with_interval(self.auth.clone(), self.token_refresh),
            },
        );
        self.dialogs.write().insert(id, controller.clone());

        let dialogs = self.dialogs.clone();
        let watched = controller.clone();
        tokio::spawn(async move {
            let reason = watched.closed().await;
            dialogs.write().remove(&id);
            tracing::debug!(dialog_id = id, reason = ?reason, "Dialog released");
        });

        (id, controller)
    }

    pub fn get(&self, id: DialogId) -> Option<Arc<DialogController>> {
        self.dialogs.read().get(&id).cloned()
    }

    pub fn open_count(&self) -> usize {
        self.dialogs.read().len()
    }

    /// Cancel every dialog that can still be cancelled. Returns how many closed.
    pub fn close_all(&self) -> usize {
        let open: Vec<Arc<DialogController>> = self.dialogs.read().values().cloned().collect();
        let closed = open.iter().filter(|dialog| dialog.cancel()).count();
        tracing::info!(closed, remaining = open.len() - closed, "Closed open dialogs");
        closed
    }
}
