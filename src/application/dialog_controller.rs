// Dialog state machine: load -> edit -> save -> close
use crate::application::collaborators::{AliasNotifier, DeviceDirectory, TelemetryGateway};
use crate::application::token_manager::AuthTokenManager;
use crate::domain::dialog::{CloseReason, DialogModel, DialogSnapshot, DialogState, SubmitOutcome};
use crate::domain::entity::{Device, EntityRef};
use crate::domain::error::{DialogError, WriteError, WriteFailure};
use crate::domain::telemetry::{TelemetrySample, TimeWindow, now_ms};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct DialogSettings {
    pub telemetry_key: String,
    pub lookback: Duration,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            telemetry_key: "temperature".to_string(),
            lookback: Duration::from_secs(60),
        }
    }
}

/// Host-side hooks handed to a dialog when it is opened.
#[derive(Clone)]
pub struct WidgetContext {
    pub aliases: Arc<dyn AliasNotifier>,
}

pub struct DialogDependencies {
    pub devices: Arc<dyn DeviceDirectory>,
    pub gateway: Arc<dyn TelemetryGateway>,
    pub tokens: AuthTokenManager,
}

pub struct DialogController {
    entity: EntityRef,
    settings: DialogSettings,
    context: WidgetContext,
    devices: Arc<dyn DeviceDirectory>,
    gateway: Arc<dyn TelemetryGateway>,
    tokens: AuthTokenManager,
    model: watch::Sender<DialogModel>,
}

impl DialogController {
    /// Create the dialog in `Loading` and start the load chain in the background.
    pub fn open(
        entity: EntityRef,
        context: WidgetContext,
        settings: DialogSettings,
        deps: DialogDependencies,
    ) -> Arc<Self> {
        let (model, _) = watch::channel(DialogModel::loading());
        let controller = Arc::new(Self {
            entity,
            settings,
            context,
            devices: deps.devices,
            gateway: deps.gateway,
            tokens: deps.tokens,
            model,
        });

        tracing::info!(
            entity_type = %controller.entity.entity_type,
            entity_id = %controller.entity.id,
            key = %controller.settings.telemetry_key,
            "Opening telemetry dialog"
        );

        let loader = Arc::clone(&controller);
        tokio::spawn(async move { loader.load().await });
        controller
    }

    pub fn state(&self) -> DialogState {
        self.model.borrow().state
    }

    pub fn snapshot(&self) -> DialogSnapshot {
        self.model.borrow().snapshot()
    }

    /// Wait until the load chain has finished (or the dialog closed first).
    pub async fn loaded(&self) -> DialogState {
        let mut rx = self.model.subscribe();
        let state = match rx.wait_for(|m| m.state != DialogState::Loading).await {
            Ok(model) => model.state,
            Err(_) => self.state(),
        };
        state
    }

    /// Resolves with the close reason once the dialog is closed.
    pub async fn closed(&self) -> Option<CloseReason> {
        let mut rx = self.model.subscribe();
        let reason = rx
            .wait_for(|m| m.close_reason.is_some())
            .await
            .ok()
            .and_then(|model| model.close_reason);
        reason
    }

    /// Apply a user edit. Only accepted while `Ready`.
    pub fn edit_value(&self, value: Option<f64>) -> bool {
        self.model.send_if_modified(|m| {
            if m.state != DialogState::Ready {
                return false;
            }
            m.form.edit(value);
            true
        })
    }

    /// Close without saving. Accepted from `Loading` and `Ready`.
    pub fn cancel(&self) -> bool {
        let closed = self.close(CloseReason::Cancelled, |state| {
            matches!(state, DialogState::Loading | DialogState::Ready)
        });
        if !closed {
            tracing::debug!(state = ?self.state(), "Ignoring cancel");
        }
        closed
    }

    /// Validate and write the edited value.
    ///
    /// The write and the transition out of `Saving` run on their own task, so
    /// dropping the returned future never strands the dialog mid-save.
    pub async fn submit(self: &Arc<Self>) -> SubmitOutcome {
        let mut outcome = None;
        let mut value = None;
        self.model.send_if_modified(|m| {
            if m.state != DialogState::Ready {
                outcome = Some(SubmitOutcome::Ignored(m.state));
                return false;
            }
            match m.form.submittable_value() {
                Ok(v) => {
                    value = Some(v);
                    m.state = DialogState::Saving;
                    m.last_error = None;
                    true
                }
                Err(e) => {
                    outcome = Some(SubmitOutcome::rejected(e));
                    false
                }
            }
        });

        let Some(value) = value else {
            return outcome.unwrap_or(SubmitOutcome::Ignored(self.state()));
        };

        let saver = Arc::clone(self);
        match tokio::spawn(async move { saver.save_and_settle(value).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let error = DialogError::from(WriteError::Transport(format!("save task failed: {}", e)));
                let outcome = SubmitOutcome::failed(&error);
                self.return_to_ready(error);
                outcome
            }
        }
    }

    async fn save_and_settle(&self, value: f64) -> SubmitOutcome {
        match self.save(value).await {
            Ok(()) => {
                self.close(CloseReason::Saved, |state| state == DialogState::Saving);
                self.context.aliases.update_aliases();
                SubmitOutcome::Saved
            }
            Err(e) => {
                tracing::error!(entity_id = %self.entity.id, error = %e, "Error saving telemetry");
                let outcome = SubmitOutcome::failed(&e);
                self.return_to_ready(e);
                outcome
            }
        }
    }

    fn return_to_ready(&self, error: DialogError) {
        self.model.send_if_modified(|m| {
            if m.state != DialogState::Saving {
                return false;
            }
            m.state = DialogState::Ready;
            m.last_error = Some(error);
            true
        });
    }

    async fn save(&self, value: f64) -> Result<(), DialogError> {
        let key = self.settings.telemetry_key.as_str();
        let token = self.tokens.get_token().await?;
        match self.gateway.write(&self.entity, key, value, &token).await {
            Ok(()) => return Ok(()),
            Err(WriteFailure::AuthExpired) => {
                tracing::info!(entity_id = %self.entity.id, "Credential rejected, refreshing before retry");
            }
            Err(WriteFailure::Write(e)) => return Err(e.into()),
        }

        self.tokens.invalidate();
        let token = self.tokens.refresh().await?;
        match self.gateway.write(&self.entity, key, value, &token).await {
            Ok(()) => Ok(()),
            Err(WriteFailure::AuthExpired) => Err(WriteError::CredentialRejected.into()),
            Err(WriteFailure::Write(e)) => Err(e.into()),
        }
    }

    async fn load(&self) {
        let device = match self.devices.get_device(&self.entity.id).await {
            Ok(device) => device,
            Err(e) => return self.finish_loading(None, Err(e.into())),
        };
        if self.is_closed() {
            return self.discard_load();
        }

        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(e) => return self.finish_loading(Some(device), Err(e.into())),
        };
        if self.is_closed() {
            return self.discard_load();
        }

        let window = TimeWindow::lookback(now_ms(), self.settings.lookback);
        let latest = self
            .gateway
            .fetch_latest(&self.entity, &self.settings.telemetry_key, window, &token)
            .await
            .map_err(DialogError::from);
        self.finish_loading(Some(device), latest);
    }

    fn finish_loading(
        &self,
        device: Option<Device>,
        latest: Result<Option<TelemetrySample>, DialogError>,
    ) {
        let applied = self.model.send_if_modified(|m| {
            if m.state != DialogState::Loading {
                return false;
            }
            if let Some(device) = &device {
                m.form.set_device_name(device.name.clone());
            }
            match &latest {
                Ok(Some(sample)) => {
                    let name = m.form.device_name().to_string();
                    m.latest = Some(*sample);
                    m.form.populate(name, Some(sample.value));
                }
                Ok(None) => {
                    tracing::info!(entity_id = %self.entity.id, "No telemetry in lookback window");
                }
                Err(e) => {
                    tracing::error!(entity_id = %self.entity.id, error = %e, "Error loading dialog data");
                    m.last_error = Some(e.clone());
                }
            }
            m.state = DialogState::Ready;
            true
        });
        if !applied {
            self.discard_load();
        }
    }

    fn discard_load(&self) {
        tracing::debug!(entity_id = %self.entity.id, "Discarding load result for closed dialog");
    }

    fn is_closed(&self) -> bool {
        self.state() == DialogState::Closed
    }

    fn close(&self, reason: CloseReason, allowed: impl Fn(DialogState) -> bool) -> bool {
        let closed = self.model.send_if_modified(|m| {
            if !allowed(m.state) {
                return false;
            }
            m.state = DialogState::Closed;
            m.close_reason = Some(reason);
            true
        });
        if closed {
            self.tokens.dispose();
            tracing::info!(entity_id = %self.entity.id, reason = ?reason, "Dialog closed");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::token_manager::tests::FakeAuthProvider;
    use crate::domain::auth::AuthToken;
    use crate::domain::error::{AuthError, LoadError, ValidationError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FakeDevices {
        result: Result<Device, LoadError>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl DeviceDirectory for FakeDevices {
        async fn get_device(&self, _id: &str) -> Result<Device, LoadError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct WriteCall {
        key: String,
        value: f64,
        token: String,
    }

    #[derive(Default)]
    struct FakeGateway {
        samples: Mutex<Option<Result<Vec<TelemetrySample>, LoadError>>>,
        reads: AtomicUsize,
        write_results: Mutex<VecDeque<Result<(), WriteFailure>>>,
        writes: Mutex<Vec<WriteCall>>,
        write_gate: Mutex<Option<Arc<Notify>>>,
    }

    impl FakeGateway {
        fn with_samples(samples: Vec<TelemetrySample>) -> Self {
            let gateway = Self::default();
            *gateway.samples.lock() = Some(Ok(samples));
            gateway
        }

        fn script_writes(&self, results: Vec<Result<(), WriteFailure>>) {
            self.write_results.lock().extend(results);
        }

        fn writes(&self) -> Vec<WriteCall> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl TelemetryGateway for FakeGateway {
        async fn fetch_latest(
            &self,
            _entity: &EntityRef,
            _key: &str,
            window: TimeWindow,
            _token: &AuthToken,
        ) -> Result<Option<TelemetrySample>, LoadError> {
            assert!(window.start_ts <= window.end_ts);
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.samples.lock().clone().unwrap_or(Ok(Vec::new())) {
                Ok(samples) => Ok(crate::domain::telemetry::latest_sample(&samples)),
                Err(e) => Err(e),
            }
        }

        async fn write(
            &self,
            _entity: &EntityRef,
            key: &str,
            value: f64,
            token: &AuthToken,
        ) -> Result<(), WriteFailure> {
            let gate = self.write_gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.writes.lock().push(WriteCall {
                key: key.to_string(),
                value,
                token: token.value().to_string(),
            });
            self.write_results.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
    }

    impl AliasNotifier for CountingNotifier {
        fn update_aliases(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        controller: Arc<DialogController>,
        gateway: Arc<FakeGateway>,
        auth: Arc<FakeAuthProvider>,
        aliases: Arc<CountingNotifier>,
    }

    fn open_with(devices: FakeDevices, gateway: FakeGateway) -> Harness {
        let gateway = Arc::new(gateway);
        let auth = Arc::new(FakeAuthProvider::default());
        let aliases = Arc::new(CountingNotifier::default());
        let controller = DialogController::open(
            EntityRef::device("123"),
            WidgetContext {
                aliases: aliases.clone(),
            },
            DialogSettings::default(),
            DialogDependencies {
                devices: Arc::new(devices),
                gateway: gateway.clone(),
                tokens: AuthTokenManager::new(auth.clone()),
            },
        );
        Harness {
            controller,
            gateway,
            auth,
            aliases,
        }
    }

    fn sensor() -> FakeDevices {
        FakeDevices {
            result: Ok(Device::new("Sensor1")),
            gate: None,
        }
    }

    async fn ready_with_latest() -> Harness {
        let harness = open_with(
            sensor(),
            FakeGateway::with_samples(vec![TelemetrySample::new(1000, 21.5)]),
        );
        assert_eq!(harness.controller.loaded().await, DialogState::Ready);
        harness
    }

    #[tokio::test]
    async fn test_load_populates_form_without_dirtying() {
        let harness = ready_with_latest().await;
        let snapshot = harness.controller.snapshot();

        assert_eq!(snapshot.device_name, "Sensor1");
        assert_eq!(snapshot.telemetry_value, Some(21.5));
        assert_eq!(snapshot.latest_telemetry, Some(TelemetrySample::new(1000, 21.5)));
        assert!(!snapshot.dirty);
        assert!(snapshot.valid);
        assert!(!snapshot.can_submit);
        assert_eq!(harness.auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_writes_once_and_closes() {
        let harness = ready_with_latest().await;
        assert!(harness.controller.edit_value(Some(25.0)));

        assert_eq!(harness.controller.submit().await, SubmitOutcome::Saved);
        assert_eq!(
            harness.gateway.writes(),
            vec![WriteCall {
                key: "temperature".to_string(),
                value: 25.0,
                token: "token-1".to_string(),
            }]
        );
        assert_eq!(harness.controller.state(), DialogState::Closed);
        assert_eq!(harness.controller.closed().await, Some(CloseReason::Saved));
        assert_eq!(harness.aliases.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_expired_refreshes_and_retries_once() {
        let harness = ready_with_latest().await;
        harness.gateway.script_writes(vec![Err(WriteFailure::AuthExpired), Ok(())]);
        harness.controller.edit_value(Some(25.0));

        assert_eq!(harness.controller.submit().await, SubmitOutcome::Saved);
        let writes = harness.gateway.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].token, "token-1");
        assert_eq!(writes[1].token, "token-2");
        assert_eq!(harness.auth.calls(), 2);
        assert_eq!(harness.aliases.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_auth_expired_is_terminal_write_error() {
        let harness = ready_with_latest().await;
        harness
            .gateway
            .script_writes(vec![Err(WriteFailure::AuthExpired), Err(WriteFailure::AuthExpired)]);
        harness.controller.edit_value(Some(25.0));

        let outcome = harness.controller.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::failed(&DialogError::Write(WriteError::CredentialRejected))
        );
        assert_eq!(harness.gateway.writes().len(), 2);

        let snapshot = harness.controller.snapshot();
        assert_eq!(snapshot.state, DialogState::Ready);
        assert_eq!(snapshot.telemetry_value, Some(25.0));
        assert!(snapshot.can_submit);
        assert_eq!(snapshot.last_error.map(|e| e.kind), Some("write"));
        assert_eq!(harness.aliases.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_error_returns_to_ready() {
        let harness = ready_with_latest().await;
        harness.gateway.script_writes(vec![Err(WriteFailure::Write(WriteError::Status {
            status: 500,
            body: "boom".to_string(),
        }))]);
        harness.controller.edit_value(Some(30.0));

        assert!(matches!(harness.controller.submit().await, SubmitOutcome::Failed(_)));
        assert_eq!(harness.gateway.writes().len(), 1);
        assert_eq!(harness.controller.state(), DialogState::Ready);
        assert_eq!(harness.controller.snapshot().telemetry_value, Some(30.0));

        // Manual retry succeeds.
        assert_eq!(harness.controller.submit().await, SubmitOutcome::Saved);
        assert_eq!(harness.controller.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn test_refresh_failure_during_retry_keeps_dialog_usable() {
        let harness = ready_with_latest().await;
        harness.gateway.script_writes(vec![Err(WriteFailure::AuthExpired)]);
        harness.auth.fail_next(AuthError::Transport("down".to_string()));
        harness.controller.edit_value(Some(25.0));

        let outcome = harness.controller.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::failed(&DialogError::Auth(AuthError::Transport("down".to_string())))
        );
        assert_eq!(harness.gateway.writes().len(), 1);
        assert_eq!(harness.controller.state(), DialogState::Ready);
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_no_data() {
        let gateway = FakeGateway::default();
        *gateway.samples.lock() = Some(Err(LoadError::Status {
            status: 500,
            body: "internal".to_string(),
        }));
        let harness = open_with(sensor(), gateway);
        assert_eq!(harness.controller.loaded().await, DialogState::Ready);

        let snapshot = harness.controller.snapshot();
        assert_eq!(snapshot.device_name, "Sensor1");
        assert_eq!(snapshot.latest_telemetry, None);
        assert_eq!(snapshot.telemetry_value, None);
        assert!(!snapshot.can_submit);
        assert_eq!(
            harness.controller.submit().await,
            SubmitOutcome::rejected(ValidationError::Required)
        );
        assert!(harness.gateway.writes().is_empty());

        harness.controller.edit_value(Some(19.0));
        assert!(harness.controller.snapshot().can_submit);
    }

    #[tokio::test]
    async fn test_device_failure_skips_token_and_read() {
        let harness = open_with(
            FakeDevices {
                result: Err(LoadError::Transport("timeout".to_string())),
                gate: None,
            },
            FakeGateway::default(),
        );
        assert_eq!(harness.controller.loaded().await, DialogState::Ready);
        assert_eq!(harness.auth.calls(), 0);
        assert_eq!(harness.gateway.reads.load(Ordering::SeqCst), 0);
        assert_eq!(harness.controller.snapshot().last_error.map(|e| e.kind), Some("load"));
    }

    #[tokio::test]
    async fn test_unchanged_value_is_not_submitted() {
        let harness = ready_with_latest().await;
        assert_eq!(
            harness.controller.submit().await,
            SubmitOutcome::rejected(ValidationError::Unchanged)
        );
        assert!(harness.gateway.writes().is_empty());
        assert_eq!(harness.controller.state(), DialogState::Ready);
    }

    #[tokio::test]
    async fn test_cancel_while_loading_ignores_late_result() {
        let gate = Arc::new(Notify::new());
        let harness = open_with(
            FakeDevices {
                result: Ok(Device::new("Sensor1")),
                gate: Some(gate.clone()),
            },
            FakeGateway::with_samples(vec![TelemetrySample::new(1000, 21.5)]),
        );
        assert_eq!(harness.controller.state(), DialogState::Loading);

        assert!(harness.controller.cancel());
        assert_eq!(harness.controller.closed().await, Some(CloseReason::Cancelled));

        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let snapshot = harness.controller.snapshot();
        assert_eq!(snapshot.state, DialogState::Closed);
        assert_eq!(snapshot.device_name, "");
        assert_eq!(snapshot.telemetry_value, None);
        assert_eq!(harness.auth.calls(), 0);
        assert_eq!(harness.gateway.reads.load(Ordering::SeqCst), 0);
        assert!(!harness.controller.cancel());
    }

    #[tokio::test]
    async fn test_closed_dialog_rejects_edits_and_submits() {
        let harness = ready_with_latest().await;
        assert!(harness.controller.cancel());

        assert!(!harness.controller.edit_value(Some(1.0)));
        assert_eq!(
            harness.controller.submit().await,
            SubmitOutcome::Ignored(DialogState::Closed)
        );
        assert_eq!(harness.aliases.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_token_timer() {
        let harness = ready_with_latest().await;
        assert_eq!(harness.auth.calls(), 1);

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(harness.auth.calls(), 2);

        harness.controller.cancel();
        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(harness.auth.calls(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_submit_still_settles() {
        let harness = ready_with_latest().await;
        let gate = Arc::new(Notify::new());
        *harness.gateway.write_gate.lock() = Some(gate.clone());
        harness.controller.edit_value(Some(25.0));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), harness.controller.submit()).await;
        assert!(abandoned.is_err());
        assert_eq!(harness.controller.state(), DialogState::Saving);

        gate.notify_one();
        assert_eq!(harness.controller.closed().await, Some(CloseReason::Saved));
        assert_eq!(harness.gateway.writes().len(), 1);
        assert_eq!(harness.aliases.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_failed_submit_returns_to_ready() {
        let harness = ready_with_latest().await;
        let gate = Arc::new(Notify::new());
        *harness.gateway.write_gate.lock() = Some(gate.clone());
        harness.gateway.script_writes(vec![Err(WriteFailure::Write(WriteError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }))]);
        harness.controller.edit_value(Some(25.0));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), harness.controller.submit()).await;
        assert!(abandoned.is_err());

        gate.notify_one();
        let mut rx = harness.controller.model.subscribe();
        rx.wait_for(|m| m.state != DialogState::Saving).await.unwrap();
        drop(rx);

        let snapshot = harness.controller.snapshot();
        assert_eq!(snapshot.state, DialogState::Ready);
        assert_eq!(snapshot.telemetry_value, Some(25.0));
        assert_eq!(snapshot.last_error.map(|e| e.kind), Some("write"));
        assert!(harness.controller.cancel());
    }
}
