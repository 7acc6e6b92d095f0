//! Step sequence state machine: which onboarding screen is active.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Direction of a step transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        };
        write!(f, "{s}")
    }
}

/// One named screen in the sequence.
///
/// `allows_back` and `allows_next` describe which navigation affordances the
/// screen offers; a step with neither is a final step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step<T = ()> {
    pub name: String,
    pub content: T,
    pub allows_back: bool,
    pub allows_next: bool,
}

impl<T> Step<T> {
    pub fn new(name: impl Into<String>, content: T) -> Self {
        Self {
            name: name.into(),
            content,
            allows_back: true,
            allows_next: true,
        }
    }

    pub fn with_back(mut self, allows_back: bool) -> Self {
        self.allows_back = allows_back;
        self
    }

    pub fn with_next(mut self, allows_next: bool) -> Self {
        self.allows_next = allows_next;
        self
    }

    /// Shorthand for a step with no navigation affordances.
    pub fn final_step(name: impl Into<String>, content: T) -> Self {
        Self::new(name, content).with_back(false).with_next(false)
    }

    pub fn is_final(&self) -> bool {
        !self.allows_back && !self.allows_next
    }
}

/// Outcome of an [`StepSequence::advance`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The active index changed.
    Moved { from: usize, to: usize },
    /// The request would leave `[0, N-1]`; nothing changed.
    AtBoundary { index: usize },
    /// The caller is not the active step; nothing changed.
    Mismatch { active: String, caller: String },
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Self::Moved { .. })
    }
}

/// Ordered, uniquely named steps with a single active index.
#[derive(Debug, Clone)]
pub struct StepSequence<T = ()> {
    steps: Vec<Step<T>>,
    active: usize,
}

impl<T> StepSequence<T> {
    /// Build a sequence starting at index 0. Fails on empty input or a
    /// repeated step name.
    pub fn new(steps: Vec<Step<T>>) -> Result<Self, StepError> {
        if steps.is_empty() {
            return Err(StepError::Empty);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name.as_str()) {
                return Err(StepError::DuplicateName {
                    name: step.name.clone(),
                });
            }
        }
        Ok(Self { steps, active: 0 })
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Step<T> {
        &self.steps[self.active]
    }

    pub fn steps(&self) -> &[Step<T>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the step named `name`, if any.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// The active step is the last one.
    pub fn is_complete(&self) -> bool {
        self.active + 1 == self.steps.len()
    }

    /// Move one step in `direction` on behalf of the step named `caller`.
    ///
    /// Requests from any step other than the active one are stale and are
    /// rejected.
    pub fn advance(&mut self, direction: Direction, caller: &str) -> Transition {
        let active = &self.steps[self.active].name;
        if active != caller {
            tracing::warn!(
                active = %active,
                caller = %caller,
                direction = %direction,
                "Step transition requested by inactive step, ignoring"
            );
            return Transition::Mismatch {
                active: active.clone(),
                caller: caller.to_string(),
            };
        }

        let target = match direction {
            Direction::Forward => self.active + 1,
            Direction::Backward => match self.active.checked_sub(1) {
                Some(index) => index,
                None => return Transition::AtBoundary { index: self.active },
            },
        };
        if target >= self.steps.len() {
            return Transition::AtBoundary { index: self.active };
        }

        let from = self.active;
        self.active = target;
        tracing::debug!(from = from, to = target, step = %self.steps[target].name, "Step changed");
        Transition::Moved { from, to: target }
    }
}
