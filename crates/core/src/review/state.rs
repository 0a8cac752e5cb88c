//! Per-position evaluation lifecycle

use serde::Serialize;

use crate::engine::EngineEvaluation;

/// Acquisition state of one position's evaluation.
///
/// `prior` is the last settled evaluation. `latest` is the newest unsettled
/// one (an intermediate update, or what a failed request left behind). Both
/// are kept for display, so a position that has shown data never falls back
/// to showing nothing, but only a settled evaluation becomes `Success`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvaluationState {
    #[default]
    Idle,
    Loading {
        prior: Option<EngineEvaluation>,
        latest: Option<EngineEvaluation>,
    },
    Success(EngineEvaluation),
    Error {
        message: String,
        prior: Option<EngineEvaluation>,
        latest: Option<EngineEvaluation>,
    },
}

/// What a consumer should show for a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// No evaluation was ever requested
    NotRequested,
    /// A request is running; data may already be displayed
    Pending,
    Ready,
    /// The last request failed, older data is still shown
    Stale,
    /// The last request failed and there is nothing to show
    Unavailable,
}

/// Deeper of the two, preferring `latest` on equal depth
fn deeper<'a>(
    latest: &'a Option<EngineEvaluation>,
    prior: &'a Option<EngineEvaluation>,
) -> Option<&'a EngineEvaluation> {
    match (latest, prior) {
        (Some(l), Some(p)) if p.depth > l.depth => Some(p),
        (Some(l), _) => Some(l),
        (None, p) => p.as_ref(),
    }
}

impl EvaluationState {
    /// Evaluation to display, if any
    pub fn displayed(&self) -> Option<&EngineEvaluation> {
        match self {
            EvaluationState::Idle => None,
            EvaluationState::Loading { prior, latest } => latest.as_ref().or(prior.as_ref()),
            EvaluationState::Success(eval) => Some(eval),
            EvaluationState::Error { prior, latest, .. } => deeper(latest, prior),
        }
    }

    /// Deepest evaluation known, settled or not
    pub fn best_known(&self) -> Option<&EngineEvaluation> {
        match self {
            EvaluationState::Idle => None,
            EvaluationState::Loading { prior, latest } | EvaluationState::Error { prior, latest, .. } => {
                deeper(latest, prior)
            }
            EvaluationState::Success(eval) => Some(eval),
        }
    }

    /// Last evaluation that came from a finished request
    pub fn settled(&self) -> Option<&EngineEvaluation> {
        match self {
            EvaluationState::Idle => None,
            EvaluationState::Loading { prior, .. } | EvaluationState::Error { prior, .. } => prior.as_ref(),
            EvaluationState::Success(eval) => Some(eval),
        }
    }

    pub fn status(&self) -> DisplayStatus {
        match self {
            EvaluationState::Idle => DisplayStatus::NotRequested,
            EvaluationState::Loading { .. } => DisplayStatus::Pending,
            EvaluationState::Success(_) => DisplayStatus::Ready,
            EvaluationState::Error { .. } if self.displayed().is_some() => DisplayStatus::Stale,
            EvaluationState::Error { .. } => DisplayStatus::Unavailable,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, EvaluationState::Loading { .. })
    }

    /// Settled successful evaluation
    pub fn success(&self) -> Option<&EngineEvaluation> {
        match self {
            EvaluationState::Success(eval) => Some(eval),
            _ => None,
        }
    }

    fn unsettled(&self) -> Option<&EngineEvaluation> {
        match self {
            EvaluationState::Loading { latest, .. } | EvaluationState::Error { latest, .. } => latest.as_ref(),
            _ => None,
        }
    }

    /// A new request starts.
    pub fn begin(&mut self) {
        *self = EvaluationState::Loading {
            prior: self.settled().cloned(),
            latest: self.unsettled().cloned(),
        };
    }

    /// An improving intermediate result arrived. Ignored unless loading.
    pub fn update(&mut self, eval: EngineEvaluation) -> bool {
        match self {
            EvaluationState::Loading { latest, .. } => {
                *latest = Some(eval);
                true
            }
            _ => false,
        }
    }

    /// The request signalled completion with the last result it produced.
    /// Returns whether it ended in success.
    pub fn complete(&mut self, result: Option<EngineEvaluation>) -> bool {
        if !self.is_loading() {
            return self.success().is_some();
        }
        match result {
            Some(eval) => {
                *self = EvaluationState::Success(eval);
                true
            }
            None => {
                self.fail("engine finished without an evaluation");
                false
            }
        }
    }

    /// The request failed or timed out.
    pub fn fail(&mut self, message: impl Into<String>) {
        *self = EvaluationState::Error {
            message: message.into(),
            prior: self.settled().cloned(),
            latest: self.unsettled().cloned(),
        };
    }

    /// The running request was abandoned.
    ///
    /// Falls back to the last settled evaluation. Unfinished data stays
    /// displayable as a stale error, never as a success.
    pub fn cancel(&mut self) {
        let EvaluationState::Loading { prior, latest } = self else {
            return;
        };
        *self = match (prior.take(), latest.take()) {
            (Some(settled), _) => EvaluationState::Success(settled),
            (None, Some(partial)) => EvaluationState::Error {
                message: "evaluation cancelled before completion".to_string(),
                prior: None,
                latest: Some(partial),
            },
            (None, None) => EvaluationState::Idle,
        };
    }
}
