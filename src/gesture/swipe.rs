//! Swipe-to-act state machine for a single row.
//!
//! A positive horizontal distance reveals the complete action, a negative one the
//! delete action. Crossing the threshold arms the action and emits one feedback
//! signal; ending the swipe while armed commits it. Everything before the commit is
//! visual only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeAction {
    ToggleComplete,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwipeDirection {
    #[default]
    None,
    /// Positive distance.
    Complete,
    /// Negative distance.
    Delete,
}

impl SwipeDirection {
    fn of(distance: f32) -> Self {
        if distance > 0.0 {
            Self::Complete
        } else if distance < 0.0 {
            Self::Delete
        } else {
            Self::None
        }
    }

    const fn action(self) -> Option<SwipeAction> {
        match self {
            Self::None => None,
            Self::Complete => Some(SwipeAction::ToggleComplete),
            Self::Delete => Some(SwipeAction::Delete),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SwipeState {
    #[default]
    Idle,
    Swiping {
        direction: SwipeDirection,
        distance: f32,
    },
    /// Terminal until [`SwipeEngine::reset`].
    Committed(SwipeAction),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwipeEvent {
    Start,
    Move { delta_x: f32 },
    End,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwipeEffect {
    /// Partial reveal; `progress` is `0.0..=1.0` of the threshold.
    Reveal {
        direction: SwipeDirection,
        progress: f32,
    },
    ActionArmed(SwipeAction),
    ActionDisarmed(SwipeAction),
    /// One discrete haptic-style signal per arming.
    Feedback,
    Commit(SwipeAction),
    SnapBack,
}

/// Pure transition: `(state, event) -> (state, effects)`.
#[must_use]
pub fn transition(
    state: SwipeState,
    event: SwipeEvent,
    threshold: f32,
) -> (SwipeState, Vec<SwipeEffect>) {
    match (state, event) {
        (SwipeState::Idle, SwipeEvent::Start) => (
            SwipeState::Swiping {
                direction: SwipeDirection::None,
                distance: 0.0,
            },
            Vec::new(),
        ),

        (SwipeState::Swiping { distance, .. }, SwipeEvent::Move { delta_x }) => {
            let before = armed(distance, threshold);
            let distance = distance + delta_x;
            let direction = SwipeDirection::of(distance);
            let after = armed(distance, threshold);

            let mut effects = Vec::with_capacity(3);
            if before != after {
                if let Some(action) = before {
                    effects.push(SwipeEffect::ActionDisarmed(action));
                }
                if let Some(action) = after {
                    effects.push(SwipeEffect::ActionArmed(action));
                    effects.push(SwipeEffect::Feedback);
                }
            }
            effects.push(SwipeEffect::Reveal {
                direction,
                progress: progress(distance, threshold),
            });
            (SwipeState::Swiping { direction, distance }, effects)
        }

        (SwipeState::Swiping { distance, .. }, SwipeEvent::End) => {
            match armed(distance, threshold) {
                Some(action) => (
                    SwipeState::Committed(action),
                    vec![SwipeEffect::Commit(action)],
                ),
                None => (SwipeState::Idle, vec![SwipeEffect::SnapBack]),
            }
        }

        (SwipeState::Swiping { .. }, SwipeEvent::Cancel) => {
            (SwipeState::Idle, vec![SwipeEffect::SnapBack])
        }

        (state, _) => (state, Vec::new()),
    }
}

fn armed(distance: f32, threshold: f32) -> Option<SwipeAction> {
    if distance.abs() >= threshold && distance != 0.0 {
        SwipeDirection::of(distance).action()
    } else {
        None
    }
}

fn progress(distance: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 1.0;
    }
    (distance.abs() / threshold).min(1.0)
}

/// Swipe state of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeEngine {
    state: SwipeState,
    threshold: f32,
}

impl SwipeEngine {
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self {
            state: SwipeState::Idle,
            threshold: threshold.max(0.0),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SwipeState {
        self.state
    }

    /// Action that would be committed if the swipe ended now.
    #[must_use]
    pub fn armed_action(&self) -> Option<SwipeAction> {
        match self.state {
            SwipeState::Swiping { distance, .. } => armed(distance, self.threshold),
            _ => None,
        }
    }

    pub fn handle(&mut self, event: SwipeEvent) -> Vec<SwipeEffect> {
        let (next, effects) = transition(self.state, event, self.threshold);
        if let SwipeState::Committed(action) = next {
            if self.state != next {
                tracing::debug!(?action, "swipe committed");
            }
        }
        self.state = next;
        effects
    }

    pub fn start(&mut self) -> Vec<SwipeEffect> {
        self.handle(SwipeEvent::Start)
    }

    pub fn swipe_move(&mut self, delta_x: f32) -> Vec<SwipeEffect> {
        self.handle(SwipeEvent::Move { delta_x })
    }

    pub fn end(&mut self) -> Vec<SwipeEffect> {
        self.handle(SwipeEvent::End)
    }

    pub fn cancel(&mut self) -> Vec<SwipeEffect> {
        self.handle(SwipeEvent::Cancel)
    }

    /// Returns to `Idle` from any state, for example after the row was re-bound.
    pub fn reset(&mut self) {
        self.state = SwipeState::Idle;
    }
}
