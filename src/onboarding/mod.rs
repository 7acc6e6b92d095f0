//! Onboarding: step sequence, global loading overlay and the flow that
//! ties them to the account API.
//!
//! A flow walks a linear sequence of named steps. Only the active step may
//! move the sequence, so a step whose async work finishes after the user
//! has navigated away cannot drag the flow along. The loading overlay is
//! shared across the flow and lives independently of step transitions.

pub mod account;
pub mod flow;
pub mod overlay;
pub mod step;

pub use account::{AccountApi, DispatcherAccountApi, HttpAccountApi};
pub use flow::{AbandonHandle, FlowStatus, OnboardingFlow};
pub use overlay::{
    LoadingOptions, LoadingOverlay, LoadingState, LoadingUpdate, OverlayPhase, OverlayTimings,
};
pub use step::{Direction, Step, StepSequence, Transition};
