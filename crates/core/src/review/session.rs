//! Review session: owns the evaluation state of every position in one game

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures::future::{select_all, FutureExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::state::EvaluationState;
use crate::engine::{EngineError, EngineEvaluation, EvalStream, Evaluator, StreamEvent};
use crate::error::{Error, Result};
use crate::timeline::Timeline;

static IDLE: EvaluationState = EvaluationState::Idle;

/// Requests running at once unless configured otherwise
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// How a request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new evaluation is running or waiting for a free slot
    Started,
    /// An earlier result at sufficient depth was kept
    Cached,
}

/// State change applied by [`ReviewSession::next_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Updated(u16),
    Completed(u16),
    Failed(u16),
}

impl SessionEvent {
    pub fn key(&self) -> u16 {
        match *self {
            SessionEvent::Updated(key) | SessionEvent::Completed(key) | SessionEvent::Failed(key) => key,
        }
    }
}

struct InFlight {
    stream: EvalStream,
    depth: u8,
    /// Counted from when the stream was opened, not from when it was queued
    deadline: Instant,
    /// Last update of this request
    received: Option<EngineEvaluation>,
}

/// Evaluations for the positions of one game.
///
/// Keys are position indexes: 0 is the starting position, `n` the position
/// after ply `n`. At most one request runs per key, and at most
/// `max_concurrent` run in total; the rest wait in request order and their
/// timeout starts only once they are running.
pub struct ReviewSession<E: Evaluator> {
    engine: E,
    positions: Vec<String>,
    states: HashMap<u16, EvaluationState>,
    in_flight: HashMap<u16, InFlight>,
    queued: VecDeque<(u16, u8)>,
    /// Requested depth of the request that produced each `Success`
    served_depth: HashMap<u16, u8>,
    timeout: Duration,
    max_concurrent: usize,
}

impl<E: Evaluator> ReviewSession<E> {
    pub fn new(engine: E, timeline: &Timeline, timeout: Duration) -> Self {
        Self::for_positions(engine, timeline.positions(), timeout)
    }

    pub fn for_positions(engine: E, positions: Vec<String>, timeout: Duration) -> Self {
        Self {
            engine,
            positions,
            states: HashMap::new(),
            in_flight: HashMap::new(),
            queued: VecDeque::new(),
            served_depth: HashMap::new(),
            timeout,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Lets up to `max` requests run at once (at least one).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Requests an evaluation of `key` at `depth`.
    ///
    /// A settled result at the same or a greater depth is reused. Otherwise
    /// any running or waiting request for the key is dropped and a new one
    /// scheduled.
    pub fn request_evaluation(&mut self, key: u16, depth: u8) -> Result<RequestOutcome> {
        if usize::from(key) >= self.positions.len() {
            return Err(Error::UnknownPosition(key));
        }

        let cached = matches!(self.states.get(&key), Some(EvaluationState::Success(_)))
            && self.served_depth.get(&key).is_some_and(|&served| served >= depth);
        if cached {
            debug!(key, depth, "serving cached evaluation");
            return Ok(RequestOutcome::Cached);
        }

        if let Some(mut previous) = self.in_flight.remove(&key) {
            debug!(key, depth = previous.depth, "superseding running evaluation");
            previous.stream.close();
        }
        self.queued.retain(|&(queued, _)| queued != key);

        self.states.entry(key).or_default().begin();
        self.queued.push_back((key, depth));
        debug!(key, depth, "requested evaluation");
        self.start_queued();
        Ok(RequestOutcome::Started)
    }

    /// Requests every position of the game.
    pub fn request_all(&mut self, depth: u8) -> Result<usize> {
        let mut started = 0;
        for key in 0..self.positions.len() as u16 {
            if self.request_evaluation(key, depth)? == RequestOutcome::Started {
                started += 1;
            }
        }
        Ok(started)
    }

    fn start_queued(&mut self) {
        while self.in_flight.len() < self.max_concurrent {
            let Some((key, depth)) = self.queued.pop_front() else {
                break;
            };
            let Some(fen) = self.positions.get(usize::from(key)) else {
                continue;
            };
            let stream = self.engine.evaluate_stream(fen, depth);
            self.in_flight.insert(
                key,
                InFlight {
                    stream,
                    depth,
                    deadline: Instant::now() + self.timeout,
                    received: None,
                },
            );
            debug!(key, depth, "evaluation started");
        }
    }

    /// Stops the running or waiting request for `key`, if any. Never fails.
    pub fn cancel_evaluation(&mut self, key: u16) {
        let waiting = self.queued.len();
        self.queued.retain(|&(queued, _)| queued != key);
        let dequeued = self.queued.len() != waiting;

        let running = self.in_flight.remove(&key);
        if let Some(mut running) = running {
            running.stream.close();
        } else if !dequeued {
            return;
        }

        if let Some(state) = self.states.get_mut(&key) {
            state.cancel();
        }
        debug!(key, "cancelled evaluation");
        self.start_queued();
    }

    pub fn evaluation_state(&self, key: u16) -> &EvaluationState {
        self.states.get(&key).unwrap_or(&IDLE)
    }

    pub fn is_pending(&self, key: u16) -> bool {
        self.in_flight.contains_key(&key) || self.queued.iter().any(|&(queued, _)| queued == key)
    }

    /// Requests running or waiting
    pub fn pending_count(&self) -> usize {
        self.in_flight.len() + self.queued.len()
    }

    /// Cancels everything and forgets all evaluations.
    pub fn reset(&mut self) {
        self.queued.clear();
        for (_, mut running) in self.in_flight.drain() {
            running.stream.close();
        }
        self.states.clear();
        self.served_depth.clear();
        debug!("review session reset");
    }

    /// Waits for the next event from any running request and applies it.
    ///
    /// Returns `None` when nothing is running or waiting.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.start_queued();
        if self.in_flight.is_empty() {
            return None;
        }

        let waiting: Vec<_> = self
            .in_flight
            .iter_mut()
            .map(|(&key, running)| {
                let deadline = running.deadline;
                let stream = &mut running.stream;
                async move { (key, timeout_at(deadline, stream.next()).await) }.boxed()
            })
            .collect();
        let ((key, received), _, rest) = select_all(waiting).await;
        drop(rest);

        let event = match received {
            Ok(Some(StreamEvent::Update(eval))) => {
                if let Some(running) = self.in_flight.get_mut(&key) {
                    running.received = Some(eval.clone());
                }
                self.states.entry(key).or_default().update(eval);
                SessionEvent::Updated(key)
            }
            Ok(Some(StreamEvent::Done)) => {
                let (depth, result) = match self.in_flight.remove(&key) {
                    Some(running) => (Some(running.depth), running.received),
                    None => (None, None),
                };
                let state = self.states.entry(key).or_default();
                if state.complete(result) {
                    if let Some(depth) = depth {
                        self.served_depth.insert(key, depth);
                    }
                    debug!(key, "evaluation complete");
                    SessionEvent::Completed(key)
                } else {
                    warn!(key, "evaluation finished without a result");
                    SessionEvent::Failed(key)
                }
            }
            Ok(Some(StreamEvent::Failed(e))) => {
                self.in_flight.remove(&key);
                self.fail(key, e)
            }
            Ok(None) => {
                self.in_flight.remove(&key);
                self.fail(key, EngineError::NoResult)
            }
            Err(_) => {
                if let Some(mut running) = self.in_flight.remove(&key) {
                    running.stream.close();
                }
                self.fail(key, EngineError::Timeout)
            }
        };

        self.start_queued();
        Some(event)
    }

    fn fail(&mut self, key: u16, error: EngineError) -> SessionEvent {
        warn!(key, error = %error, "evaluation failed");
        self.states.entry(key).or_default().fail(error.to_string());
        SessionEvent::Failed(key)
    }

    /// Processes events until `key` has no running or waiting request.
    pub async fn drive(&mut self, key: u16) -> &EvaluationState {
        while self.is_pending(key) {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.evaluation_state(key)
    }

    /// Processes events until nothing is running or waiting.
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    /// Settled evaluations by key, for classification
    pub fn completed_evaluations(&self) -> HashMap<u16, EngineEvaluation> {
        self.states
            .iter()
            .filter_map(|(&key, state)| state.success().map(|eval| (key, eval.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::EngineScore;
    use crate::review::DisplayStatus;

    enum Step {
        Update(EngineEvaluation),
        Done,
        Fail(&'static str),
        /// Keep the channel open without sending anything else
        Hang,
    }

    #[derive(Default)]
    struct ScriptedEngine {
        scripts: Mutex<VecDeque<Vec<Step>>>,
        calls: Mutex<Vec<(String, u8)>>,
        held: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
    }

    impl ScriptedEngine {
        fn with_scripts(scripts: Vec<Vec<Step>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                ..Default::default()
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Evaluator for ScriptedEngine {
        fn evaluate_stream(&self, fen: &str, depth: u8) -> EvalStream {
            self.calls.lock().unwrap().push((fen.to_string(), depth));
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            let (tx, stream) = EvalStream::channel();
            for step in script {
                let _ = match step {
                    Step::Update(eval) => tx.try_send(StreamEvent::Update(eval)),
                    Step::Done => tx.try_send(StreamEvent::Done),
                    Step::Fail(msg) => {
                        tx.try_send(StreamEvent::Failed(EngineError::Protocol(msg.to_string())))
                    }
                    Step::Hang => {
                        self.held.lock().unwrap().push(tx.clone());
                        Ok(())
                    }
                };
            }
            stream
        }
    }

    fn eval(cp: i32, depth: u8) -> EngineEvaluation {
        EngineEvaluation::new("e2e4", EngineScore::cp(cp), depth)
    }

    fn positions() -> Vec<String> {
        vec!["start".to_string(), "after-1".to_string(), "after-2".to_string()]
    }

    fn session(engine: &Arc<ScriptedEngine>) -> ReviewSession<Arc<ScriptedEngine>> {
        ReviewSession::for_positions(engine.clone(), positions(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_progressive_updates_then_success() {
        let engine = ScriptedEngine::with_scripts(vec![vec![
            Step::Update(eval(10, 6)),
            Step::Update(eval(22, 12)),
            Step::Done,
        ]]);
        let mut session = session(&engine);

        assert_eq!(session.request_evaluation(1, 12).unwrap(), RequestOutcome::Started);
        assert_eq!(session.evaluation_state(1).status(), DisplayStatus::Pending);

        assert_eq!(session.next_event().await, Some(SessionEvent::Updated(1)));
        assert_eq!(session.evaluation_state(1).displayed().unwrap().depth, 6);

        let state = session.drive(1).await;
        assert_eq!(state, &EvaluationState::Success(eval(22, 12)));
        assert!(!session.is_pending(1));
        assert_eq!(engine.calls.lock().unwrap()[0], ("after-1".to_string(), 12));
    }

    #[tokio::test]
    async fn test_cache_by_depth() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Update(eval(30, 16)), Step::Done],
            vec![Step::Update(eval(35, 22)), Step::Done],
        ]);
        let mut session = session(&engine);

        session.request_evaluation(0, 16).unwrap();
        session.drive(0).await;

        assert_eq!(session.request_evaluation(0, 16).unwrap(), RequestOutcome::Cached);
        assert_eq!(session.request_evaluation(0, 10).unwrap(), RequestOutcome::Cached);
        assert_eq!(engine.call_count(), 1);

        assert_eq!(session.request_evaluation(0, 22).unwrap(), RequestOutcome::Started);
        assert_eq!(engine.call_count(), 2);
        // Old value stays visible while the deeper search runs.
        assert_eq!(session.evaluation_state(0).displayed().unwrap().depth, 16);
        assert_eq!(session.drive(0).await.success().unwrap().depth, 22);
    }

    #[tokio::test]
    async fn test_failure_keeps_prior_value() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Update(eval(30, 16)), Step::Done],
            vec![Step::Fail("engine crashed")],
        ]);
        let mut session = session(&engine);

        session.request_evaluation(2, 16).unwrap();
        session.drive(2).await;
        session.request_evaluation(2, 20).unwrap();

        let state = session.drive(2).await;
        assert_eq!(state.status(), DisplayStatus::Stale);
        assert_eq!(state.displayed(), Some(&eval(30, 16)));
        match state {
            EvaluationState::Error { message, .. } => assert!(message.contains("engine crashed")),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_without_data() {
        let engine = ScriptedEngine::with_scripts(vec![vec![Step::Fail("bad fen")]]);
        let mut session = session(&engine);
        session.request_evaluation(0, 10).unwrap();
        assert_eq!(session.next_event().await, Some(SessionEvent::Failed(0)));
        assert_eq!(session.evaluation_state(0).status(), DisplayStatus::Unavailable);
        assert!(session.completed_evaluations().is_empty());
    }

    #[tokio::test]
    async fn test_stream_closed_without_terminal() {
        let engine = ScriptedEngine::with_scripts(vec![vec![Step::Update(eval(-40, 9))]]);
        let mut session = session(&engine);
        session.request_evaluation(1, 18).unwrap();

        let state = session.drive(1).await;
        assert_eq!(state.status(), DisplayStatus::Stale);
        assert_eq!(state.displayed(), Some(&eval(-40, 9)));
    }

    #[tokio::test]
    async fn test_new_request_closes_previous() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Hang],
            vec![Step::Update(eval(12, 14)), Step::Done],
        ]);
        let mut session = session(&engine);

        session.request_evaluation(1, 14).unwrap();
        session.request_evaluation(1, 18).unwrap();
        assert!(engine.held.lock().unwrap()[0].is_closed());
        assert_eq!(session.pending_count(), 1);

        assert_eq!(session.drive(1).await.success(), Some(&eval(12, 14)));
    }

    #[tokio::test]
    async fn test_cancel() {
        let engine = ScriptedEngine::with_scripts(vec![vec![Step::Hang]]);
        let mut session = session(&engine);

        session.cancel_evaluation(2);
        session.request_evaluation(2, 10).unwrap();
        session.cancel_evaluation(2);
        session.cancel_evaluation(2);

        assert!(engine.held.lock().unwrap()[0].is_closed());
        assert_eq!(session.evaluation_state(2), &EvaluationState::Idle);
        assert_eq!(session.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let engine = ScriptedEngine::with_scripts(vec![vec![Step::Update(eval(5, 4)), Step::Hang]]);
        let mut session = session(&engine);
        session.request_evaluation(0, 30).unwrap();

        assert_eq!(session.next_event().await, Some(SessionEvent::Updated(0)));
        assert_eq!(session.next_event().await, Some(SessionEvent::Failed(0)));

        let state = session.evaluation_state(0);
        assert_eq!(state.status(), DisplayStatus::Stale);
        match state {
            EvaluationState::Error { message, .. } => assert!(message.contains("timed out")),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(engine.held.lock().unwrap()[0].is_closed());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Update(eval(20, 10)), Step::Done],
            vec![Step::Update(eval(25, 10)), Step::Done],
            vec![Step::Fail("lost")],
        ]);
        let mut session = session(&engine);
        assert_eq!(session.request_all(10).unwrap(), 3);
        session.settle().await;

        let completed = session.completed_evaluations();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[&0], eval(20, 10));
        assert_eq!(completed[&1], eval(25, 10));
        assert_eq!(session.evaluation_state(2).status(), DisplayStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let engine = ScriptedEngine::with_scripts(vec![]);
        let mut session = session(&engine);
        assert!(matches!(
            session.request_evaluation(3, 10),
            Err(Error::UnknownPosition(3))
        ));
        assert_eq!(session.evaluation_state(99), &EvaluationState::Idle);
    }

    #[tokio::test]
    async fn test_reset() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Update(eval(20, 10)), Step::Done],
            vec![Step::Hang],
        ]);
        let mut session = session(&engine);
        session.request_evaluation(0, 10).unwrap();
        session.drive(0).await;
        session.request_evaluation(1, 10).unwrap();

        session.reset();
        assert_eq!(session.pending_count(), 0);
        assert!(engine.held.lock().unwrap()[0].is_closed());
        assert_eq!(session.evaluation_state(0), &EvaluationState::Idle);
        assert!(session.completed_evaluations().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_drops_unsettled_update() {
        let engine = ScriptedEngine::with_scripts(vec![
            vec![Step::Update(eval(15, 8)), Step::Hang],
            vec![Step::Update(eval(20, 10)), Step::Done],
            vec![Step::Update(eval(60, 14)), Step::Hang],
        ]);
        let mut session = session(&engine);

        session.request_evaluation(0, 20).unwrap();
        assert_eq!(session.next_event().await, Some(SessionEvent::Updated(0)));
        session.cancel_evaluation(0);
        assert!(session.completed_evaluations().is_empty());
        assert_eq!(session.evaluation_state(0).status(), DisplayStatus::Stale);

        session.request_evaluation(1, 10).unwrap();
        session.drive(1).await;
        session.request_evaluation(1, 20).unwrap();
        assert_eq!(session.next_event().await, Some(SessionEvent::Updated(1)));
        session.cancel_evaluation(1);
        assert_eq!(session.completed_evaluations()[&1], eval(20, 10));
    }

    #[tokio::test]
    async fn test_cancel_waiting_request() {
        let engine = ScriptedEngine::with_scripts(vec![vec![Step::Hang]]);
        let mut session = session(&engine);

        session.request_evaluation(0, 10).unwrap();
        session.request_evaluation(1, 10).unwrap();
        assert_eq!(engine.call_count(), 1);
        assert!(session.is_pending(1));

        session.cancel_evaluation(1);
        assert!(!session.is_pending(1));
        assert_eq!(session.evaluation_state(1), &EvaluationState::Idle);
        assert_eq!(session.pending_count(), 1);
        assert_eq!(engine.call_count(), 1);
    }

    /// Runs one search at a time, like a single engine process
    struct SerialEngine {
        busy: Arc<tokio::sync::Mutex<()>>,
        search_time: Duration,
    }

    impl Evaluator for SerialEngine {
        fn evaluate_stream(&self, _fen: &str, depth: u8) -> EvalStream {
            let (tx, stream) = EvalStream::channel();
            let busy = Arc::clone(&self.busy);
            let search_time = self.search_time;
            tokio::spawn(async move {
                let _guard = busy.lock().await;
                tokio::time::sleep(search_time).await;
                let _ = tx.send(StreamEvent::Update(eval(0, depth))).await;
                let _ = tx.send(StreamEvent::Done).await;
            });
            stream
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_requests_do_not_time_out() {
        let engine = SerialEngine {
            busy: Arc::new(tokio::sync::Mutex::new(())),
            search_time: Duration::from_secs(1),
        };
        let positions: Vec<String> = (0..12).map(|i| format!("position-{}", i)).collect();
        let mut session = ReviewSession::for_positions(engine, positions, Duration::from_secs(5));

        assert_eq!(session.request_all(10).unwrap(), 12);
        assert_eq!(session.pending_count(), 12);
        session.settle().await;

        assert_eq!(session.completed_evaluations().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_limit() {
        let engine = SerialEngine {
            busy: Arc::new(tokio::sync::Mutex::new(())),
            search_time: Duration::from_secs(2),
        };
        let positions: Vec<String> = (0..4).map(|i| format!("position-{}", i)).collect();
        let mut session =
            ReviewSession::for_positions(engine, positions, Duration::from_secs(5)).with_max_concurrent(4);

        // All four clocks start together but the engine serves them one by
        // one, so the last ones run out of time.
        session.request_all(10).unwrap();
        session.settle().await;

        let completed = session.completed_evaluations();
        assert_eq!(completed.len(), 2);
        assert_eq!(session.evaluation_state(3).status(), DisplayStatus::Unavailable);
    }
}
