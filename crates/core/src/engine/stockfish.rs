//! Stockfish chess engine interface
//!
//! Spawns Stockfish as a subprocess and communicates via UCI protocol.
//! Searches run on a background task and report through an [`EvalStream`].

use std::process::Stdio;
use std::sync::Arc;

use shakmaty::Color;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::analysis::{EngineEvaluation, EngineLine, MAX_ALTERNATE_LINES};
use super::score::EngineScore;
use super::stream::{EngineError, EvalStream, Evaluator, StreamEvent};

/// Wrapper around Stockfish chess engine
pub struct StockfishEngine {
    process: Arc<Mutex<EngineProcess>>,
    multi_pv: u8,
}

struct EngineProcess {
    /// The child process
    child: Child,
    /// Stdin for sending commands
    stdin: ChildStdin,
    /// Stdout reader for receiving responses
    stdout: BufReader<ChildStdout>,
}

/// Parsed contents of one `info` line
#[derive(Debug, Default, PartialEq)]
struct InfoLine {
    depth: u8,
    multipv: usize,
    score: Option<EngineScore>,
    bound: bool,
    pv: Vec<String>,
}

impl StockfishEngine {
    /// Creates a new Stockfish engine instance
    ///
    /// # Arguments
    /// * `path` - Path to stockfish binary (or "stockfish" if in PATH)
    /// * `multi_pv` - Number of lines to search, clamped to 1..=3
    ///
    /// # Example
    /// ```ignore
    /// let engine = StockfishEngine::new("stockfish", 3).await?;
    /// ```
    pub async fn new(path: &str, multi_pv: u8) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdin".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdout".into()))?;

        let multi_pv = multi_pv.clamp(1, MAX_ALTERNATE_LINES as u8);
        let mut process = EngineProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        process.send("uci").await?;
        process.read_until("uciok").await?;
        process
            .send(&format!("setoption name MultiPV value {}", multi_pv))
            .await?;
        process.send("isready").await?;
        process.read_until("readyok").await?;

        Ok(Self {
            process: Arc::new(Mutex::new(process)),
            multi_pv,
        })
    }

    /// Quit the engine cleanly
    pub async fn quit(&self) -> Result<(), EngineError> {
        let mut process = self.process.lock().await;
        process.send("quit").await?;
        let _ = process.child.wait().await;
        Ok(())
    }
}

impl Evaluator for StockfishEngine {
    fn evaluate_stream(&self, fen: &str, depth: u8) -> EvalStream {
        let (tx, stream) = EvalStream::channel();
        let process = Arc::clone(&self.process);
        let fen = fen.to_string();
        let multi_pv = self.multi_pv as usize;

        tokio::spawn(async move {
            let mut process = process.lock().await;
            if let Err(e) = process.search(&fen, depth, multi_pv, &tx).await {
                warn!(error = %e, fen = %fen, "engine search failed");
                let _ = tx.send(StreamEvent::Failed(e)).await;
            }
        });

        stream
    }
}

impl EngineProcess {
    /// Sends a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "engine <");
        self.stdin.write_all(format!("{}\n", cmd).as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads a line from the engine
    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).await?;
        if read == 0 {
            return Err(EngineError::Protocol("engine closed its output".into()));
        }
        Ok(line.trim().to_string())
    }

    /// Reads lines until we get the expected response
    async fn read_until(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            let line = self.read_line().await?;
            if line.starts_with(expected) {
                return Ok(());
            }
        }
    }

    /// Runs one search, forwarding progress to `tx`.
    ///
    /// If the receiver goes away mid-search the engine is stopped and drained
    /// to `bestmove` so the next search starts from a clean state.
    async fn search(
        &mut self,
        fen: &str,
        depth: u8,
        multi_pv: usize,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), EngineError> {
        let side_to_move = side_to_move(fen)?;

        self.send(&format!("position fen {}", fen)).await?;
        self.send(&format!("go depth {}", depth)).await?;

        let mut lines: Vec<Option<EngineLine>> = vec![None; multi_pv];
        let mut reached_depth = 0u8;
        let mut abandoned = false;

        loop {
            let line = self.read_line().await?;

            if let Some(rest) = line.strip_prefix("bestmove") {
                if abandoned {
                    return Ok(());
                }
                let best_move = match rest.split_whitespace().next() {
                    Some("(none)") | None => String::new(),
                    Some(mv) => mv.to_string(),
                };
                let eval = build_evaluation(best_move, reached_depth, &lines);
                let _ = tx.send(StreamEvent::Update(eval)).await;
                let _ = tx.send(StreamEvent::Done).await;
                return Ok(());
            }

            if abandoned || !line.starts_with("info") {
                continue;
            }

            let info = parse_info_line(&line);
            if info.bound || info.score.is_none() {
                continue;
            }

            let index = info.multipv.saturating_sub(1);
            if index >= lines.len() {
                continue;
            }
            lines[index] = Some(EngineLine {
                moves: info.pv.clone(),
                score: info.score.map(|s| s.from_side_to_move(side_to_move)),
            });

            if index == 0 {
                reached_depth = info.depth;
                let best_move = info.pv.first().cloned().unwrap_or_default();
                let eval = build_evaluation(best_move, reached_depth, &lines);
                if tx.send(StreamEvent::Update(eval)).await.is_err() {
                    debug!(fen, "evaluation stream closed, stopping search");
                    self.send("stop").await?;
                    abandoned = true;
                }
            }
        }
    }
}

fn side_to_move(fen: &str) -> Result<Color, EngineError> {
    match fen.split_whitespace().nth(1) {
        Some("w") => Ok(Color::White),
        Some("b") => Ok(Color::Black),
        _ => Err(EngineError::Protocol(format!("FEN has no side to move: {}", fen))),
    }
}

fn build_evaluation(best_move: String, depth: u8, lines: &[Option<EngineLine>]) -> EngineEvaluation {
    let known: Vec<EngineLine> = lines.iter().flatten().cloned().collect();
    let (score, principal_variation) = match known.first() {
        Some(line) => (line.score, line.moves.clone()),
        None => (None, Vec::new()),
    };

    EngineEvaluation {
        best_move,
        score,
        depth,
        principal_variation,
        alternate_lines: known,
    }
}

/// Parses an info line from Stockfish
fn parse_info_line(line: &str) -> InfoLine {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut info = InfoLine {
        multipv: 1,
        ..InfoLine::default()
    };
    let mut i = 0;

    while i < parts.len() {
        match parts[i] {
            "depth" => {
                if i + 1 < parts.len() {
                    info.depth = parts[i + 1].parse().unwrap_or(0);
                }
                i += 2;
            }
            "multipv" => {
                if i + 1 < parts.len() {
                    info.multipv = parts[i + 1].parse().unwrap_or(1);
                }
                i += 2;
            }
            "score" => {
                if i + 2 < parts.len() {
                    info.score = match (parts[i + 1], parts[i + 2].parse::<i32>()) {
                        ("cp", Ok(cp)) => Some(EngineScore::cp(cp)),
                        ("mate", Ok(m)) => Some(EngineScore::mate(m)),
                        _ => None,
                    };
                }
                i += 3;
            }
            "lowerbound" | "upperbound" => {
                info.bound = true;
                i += 1;
            }
            "pv" => {
                // Everything after "pv" is the principal variation
                info.pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            _ => {
                i += 1;
            }
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_line() {
        let info = parse_info_line(
            "info depth 18 seldepth 24 multipv 2 score cp -35 nodes 123456 nps 1000 time 120 pv e7e5 g1f3 b8c6",
        );
        assert_eq!(info.depth, 18);
        assert_eq!(info.multipv, 2);
        assert_eq!(info.score, Some(EngineScore::cp(-35)));
        assert!(!info.bound);
        assert_eq!(info.pv, vec!["e7e5", "g1f3", "b8c6"]);
    }

    #[test]
    fn test_parse_mate_and_bound() {
        let info = parse_info_line("info depth 5 score mate -2 pv h7h6");
        assert_eq!(info.score, Some(EngineScore::mate(-2)));
        assert_eq!(info.multipv, 1);

        let info = parse_info_line("info depth 20 score cp 40 lowerbound nodes 10");
        assert!(info.bound);
    }

    #[test]
    fn test_side_to_move() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        assert_eq!(side_to_move(fen).unwrap(), Color::Black);
        assert!(side_to_move("garbage").is_err());
    }

    #[test]
    fn test_build_evaluation_orders_lines() {
        let lines = vec![
            Some(EngineLine {
                moves: vec!["e2e4".into(), "e7e5".into()],
                score: Some(EngineScore::cp(30)),
            }),
            None,
            Some(EngineLine {
                moves: vec!["a2a3".into()],
                score: Some(EngineScore::cp(-10)),
            }),
        ];
        let eval = build_evaluation("e2e4".into(), 12, &lines);
        assert_eq!(eval.score, Some(EngineScore::cp(30)));
        assert_eq!(eval.principal_variation, vec!["e2e4", "e7e5"]);
        assert_eq!(eval.alternate_lines.len(), 2);
    }

    #[tokio::test]
    #[ignore] // Ignore by default - requires stockfish installed
    async fn test_analyze_starting_position() {
        let engine = StockfishEngine::new("stockfish", 3).await.unwrap();
        let eval = engine
            .evaluate("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 10)
            .await
            .unwrap();

        assert!(!eval.best_move.is_empty());
        assert!(eval.score.is_some());
        println!("{}", eval.summary());
    }
}
