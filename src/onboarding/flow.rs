//! OnboardingFlow: binds the step sequence, the loading overlay and the
//! account API into one owner.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::account::AccountApi;
use super::overlay::{LoadingOptions, LoadingOverlay, LoadingState};
use super::step::{Direction, StepSequence, Transition};
use crate::backend::UserRecord;
use crate::error::AccountError;

/// Snapshot of a flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowStatus {
    pub active_step: String,
    pub active_index: usize,
    pub complete: bool,
    pub abandoned: bool,
    pub loading: LoadingState,
}

/// Abandons a flow from outside it, e.g. when the user navigates away.
#[derive(Clone)]
pub struct AbandonHandle {
    flag: Arc<watch::Sender<bool>>,
    overlay: LoadingOverlay,
}

impl AbandonHandle {
    /// Cancel in-flight step actions and release the overlay.
    pub fn abandon(&self) {
        if !self.flag.send_replace(true) {
            tracing::info!("Onboarding flow abandoned");
        }
        self.overlay.hide_loading();
    }

    pub fn is_abandoned(&self) -> bool {
        *self.flag.borrow()
    }
}

/// Owns one run through an onboarding sequence.
pub struct OnboardingFlow<T = ()> {
    steps: StepSequence<T>,
    overlay: LoadingOverlay,
    accounts: Arc<dyn AccountApi>,
    abandon: AbandonHandle,
}

impl<T> OnboardingFlow<T> {
    pub fn new(
        steps: StepSequence<T>,
        overlay: LoadingOverlay,
        accounts: Arc<dyn AccountApi>,
    ) -> Self {
        let (flag, _rx) = watch::channel(false);
        let abandon = AbandonHandle {
            flag: Arc::new(flag),
            overlay: overlay.clone(),
        };
        Self {
            steps,
            overlay,
            accounts,
            abandon,
        }
    }

    pub fn steps(&self) -> &StepSequence<T> {
        &self.steps
    }

    pub fn overlay(&self) -> &LoadingOverlay {
        &self.overlay
    }

    pub fn abandon_handle(&self) -> AbandonHandle {
        self.abandon.clone()
    }

    pub fn abandon(&self) {
        self.abandon.abandon();
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandon.is_abandoned()
    }

    /// Move on behalf of step `caller`. Landing on a final step releases the
    /// overlay. Abandoned flows do not move.
    pub fn advance(&mut self, direction: Direction, caller: &str) -> Transition {
        if self.is_abandoned() {
            tracing::debug!(caller = %caller, "Ignoring transition on abandoned flow");
            return Transition::AtBoundary {
                index: self.steps.active_index(),
            };
        }
        let transition = self.steps.advance(direction, caller);
        if transition.moved() && self.steps.active().is_final() {
            tracing::debug!(step = %self.steps.active().name, "Reached final step");
            self.overlay.hide_loading();
        }
        transition
    }

    /// Sign-up action for step `caller`: show the overlay, create the
    /// account, then advance. On failure the overlay is hidden and the step
    /// stays put. Abandoning the flow while the request is pending resolves
    /// to [`AccountError::Cancelled`].
    pub async fn register(
        &mut self,
        caller: &str,
        email: &str,
        password: &str,
        loading: LoadingOptions,
    ) -> Result<UserRecord, AccountError> {
        let mut abandoned = self.abandon.flag.subscribe();
        if *abandoned.borrow_and_update() {
            return Err(AccountError::Cancelled);
        }

        self.overlay.show_loading(loading);
        let result = tokio::select! {
            result = self.accounts.create_account(email, password) => result,
            _ = abandoned.wait_for(|abandoned| *abandoned) => Err(AccountError::Cancelled),
        };

        match result {
            Ok(record) => {
                tracing::info!(uid = %record.uid, step = %caller, "Account registered");
                self.overlay.mark_loading_complete();
                self.advance(Direction::Forward, caller);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(step = %caller, error = %e, "Registration failed");
                self.overlay.hide_loading();
                Err(e)
            }
        }
    }

    pub fn status(&self) -> FlowStatus {
        FlowStatus {
            active_step: self.steps.active().name.clone(),
            active_index: self.steps.active_index(),
            complete: self.steps.is_complete(),
            abandoned: self.is_abandoned(),
            loading: self.overlay.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, PermissionSet, Services, UserHooks, api_dispatcher};
    use crate::config::{AppConfig, ConfigSource};
    use crate::email::{EmailConfig, SmtpMailer};
    use crate::onboarding::account::DispatcherAccountApi;
    use crate::onboarding::step::Step;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn accounts() -> Arc<dyn AccountApi> {
        let config = AppConfig::from_source(ConfigSource::default(), json!({})).unwrap();
        let backend = Arc::new(MemoryBackend::new("http://localhost/reset"));
        let services = Services {
            identity: backend.clone(),
            store: backend,
            mailer: Arc::new(SmtpMailer::new(EmailConfig::default())),
            hooks: UserHooks::default(),
        };
        let dispatcher = api_dispatcher(Arc::new(config), services).unwrap();
        Arc::new(DispatcherAccountApi::new(Arc::new(dispatcher)))
    }

    fn flow(accounts: Arc<dyn AccountApi>) -> OnboardingFlow {
        let steps = StepSequence::new(vec![
            Step::new("intro", ()).with_back(false),
            Step::new("signup", ()),
            Step::final_step("welcome", ()),
        ])
        .unwrap();
        OnboardingFlow::new(steps, LoadingOverlay::new(), accounts)
    }

    /// Never answers; used to hold a registration in flight.
    struct Hanging;

    #[async_trait]
    impl AccountApi for Hanging {
        async fn create_account(&self, _: &str, _: &str) -> Result<UserRecord, AccountError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(AccountError::Transport("timed out".into()))
        }
        async fn request_password_reset(&self, _: &str) -> Result<(), AccountError> {
            Ok(())
        }
        async fn permissions(&self, _: &str) -> Result<PermissionSet, AccountError> {
            Ok(PermissionSet::new())
        }
        async fn delete_account(&self, _: &str) -> Result<(), AccountError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn registration_advances_to_final_step() {
        let mut flow = flow(accounts());
        flow.advance(Direction::Forward, "intro");

        let record = flow
            .register("signup", "a@b.com", "secret1", LoadingOptions::new("Creating account"))
            .await
            .unwrap();
        assert_eq!(record.email, "a@b.com");

        let status = flow.status();
        assert_eq!(status.active_step, "welcome");
        assert!(status.complete);
        assert!(!status.loading.is_loading);
    }

    #[tokio::test]
    async fn failed_registration_stays_on_step() {
        let mut flow = flow(accounts());
        flow.advance(Direction::Forward, "intro");
        let err = flow
            .register("signup", "not-an-email", "secret1", LoadingOptions::new("Creating"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Rejected { status: 400, .. }));
        assert_eq!(flow.steps().active().name, "signup");
        assert!(!flow.overlay().is_loading());
    }

    #[tokio::test]
    async fn stale_step_cannot_advance_after_registration() {
        let mut flow = flow(accounts());
        // Registration completes for a step that is no longer active.
        flow.register("signup", "a@b.com", "secret1", LoadingOptions::new("Creating"))
            .await
            .unwrap();
        assert_eq!(flow.steps().active().name, "intro");
    }

    #[tokio::test(start_paused = true)]
    async fn abandon_cancels_pending_registration() {
        let mut flow = flow(Arc::new(Hanging));
        flow.advance(Direction::Forward, "intro");

        let handle = flow.abandon_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.abandon();
        });

        let err = flow
            .register("signup", "a@b.com", "secret1", LoadingOptions::new("Creating"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Cancelled));
        assert!(flow.is_abandoned());
        assert!(!flow.overlay().is_loading());
        assert_eq!(flow.steps().active().name, "signup");
        assert!(!flow.advance(Direction::Forward, "signup").moved());
    }

    #[tokio::test]
    async fn abandoned_flow_refuses_registration() {
        let mut flow = flow(accounts());
        flow.abandon();
        let err = flow
            .register("intro", "a@b.com", "secret1", LoadingOptions::new("Creating"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Cancelled));
    }
}
