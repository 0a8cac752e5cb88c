//! Progressive evaluation channel and the evaluator capability

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

use super::analysis::EngineEvaluation;

/// Buffer size for evaluation channels
pub const STREAM_BUFFER: usize = 32;

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to start the engine process
    #[error("Failed to start engine: {0}")]
    Spawn(String),
    /// Failed to communicate with engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Engine returned unexpected response
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// No terminal signal within the allowed time
    #[error("Evaluation timed out")]
    Timeout,
    /// Stream ended without producing an evaluation
    #[error("Engine produced no evaluation")]
    NoResult,
    /// A remote evaluation service refused or failed the request
    #[error("Remote evaluation failed: {0}")]
    Remote(String),
}

/// One item on an evaluation channel.
///
/// A channel carries zero or more `Update`s followed by exactly one `Done`
/// or `Failed`.
#[derive(Debug)]
pub enum StreamEvent {
    Update(EngineEvaluation),
    Done,
    Failed(EngineError),
}

/// Receiving half of a progressive evaluation.
///
/// Dropping or closing it tells the producer to stop.
#[derive(Debug)]
pub struct EvalStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EvalStream {
    pub fn new(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self { rx }
    }

    /// Creates a connected producer/stream pair
    pub fn channel() -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        (tx, Self::new(rx))
    }

    /// Next event, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Stops accepting events. Safe to call on an already-closed stream.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Drains the stream and returns the last evaluation it delivered.
    pub async fn finish(mut self) -> Result<EngineEvaluation, EngineError> {
        let mut latest = None;
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Update(eval) => latest = Some(eval),
                StreamEvent::Done => break,
                StreamEvent::Failed(e) => return Err(e),
            }
        }
        latest.ok_or(EngineError::NoResult)
    }
}

/// Anything that can evaluate a FEN position.
pub trait Evaluator {
    /// Starts a progressive evaluation. Improving results arrive as `Update`s.
    fn evaluate_stream(&self, fen: &str, depth: u8) -> EvalStream;

    /// Single-shot evaluation: the final result of a stream.
    fn evaluate(
        &self,
        fen: &str,
        depth: u8,
    ) -> impl Future<Output = Result<EngineEvaluation, EngineError>> + Send {
        self.evaluate_stream(fen, depth).finish()
    }
}

impl<E: Evaluator + ?Sized> Evaluator for std::sync::Arc<E> {
    fn evaluate_stream(&self, fen: &str, depth: u8) -> EvalStream {
        (**self).evaluate_stream(fen, depth)
    }
}
