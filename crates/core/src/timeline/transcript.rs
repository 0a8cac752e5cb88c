//! Transcript (PGN movetext) parsing and move validation

use std::io::Cursor;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use pgn_reader::{RawComment, RawTag, SanPlus, Skip, Visitor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square};

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[%clk\s+([0-9]+(?::[0-9]{1,2}){0,2}(?:\.[0-9]+)?)\]").unwrap());

/// Header tags of a transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTags {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<u16>,
    pub black_elo: Option<u16>,
    /// Custom starting position
    pub fen: Option<String>,
}

/// A validated move and the position it produced
#[derive(Debug, Clone)]
pub(crate) struct AppliedMove {
    pub san: String,
    pub uci: String,
    pub color: Color,
    pub fen: String,
    pub clock: Option<String>,
    pub only_legal_move: bool,
    pub gives_checkmate: bool,
}

#[derive(Debug)]
pub(crate) struct ParsedGame {
    pub tags: GameTags,
    pub start_fen: String,
    pub moves: Vec<AppliedMove>,
}

struct GameMoves {
    tags: GameTags,
    start_fen: String,
    position: Chess,
    moves: Vec<AppliedMove>,
    error: Option<String>,
}

struct TranscriptParser;

impl Visitor for TranscriptParser {
    type Tags = GameTags;
    type Movetext = GameMoves;
    type Output = Result<ParsedGame, String>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let name_str = String::from_utf8_lossy(name);
        let value_str = value.decode_utf8_lossy().to_string();

        match name_str.as_ref() {
            "Event" => tags.event = Some(value_str),
            "Site" => tags.site = Some(value_str),
            "Date" => tags.date = Some(value_str),
            "White" => tags.white = Some(value_str),
            "Black" => tags.black = Some(value_str),
            "Result" => tags.result = Some(value_str),
            "WhiteElo" => tags.white_elo = value_str.parse().ok(),
            "BlackElo" => tags.black_elo = value_str.parse().ok(),
            "FEN" => tags.fen = Some(value_str),
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let position = match tags.fen.as_deref() {
            Some(fen) => match start_position(fen) {
                Ok(position) => position,
                Err(e) => return ControlFlow::Break(Err(e)),
            },
            None => Chess::default(),
        };

        ControlFlow::Continue(GameMoves {
            tags,
            start_fen: fen_of(&position),
            position,
            moves: Vec::new(),
            error: None,
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if movetext.error.is_some() {
            return ControlFlow::Continue(());
        }

        let ply = movetext.moves.len() + 1;
        let mv = match san.san.to_move(&movetext.position) {
            Ok(m) => m,
            Err(e) => {
                movetext.error = Some(format!("ply {} ({}): {}", ply, san, e));
                return ControlFlow::Continue(());
            }
        };

        let color = movetext.position.turn();
        let only_legal_move = movetext.position.legal_moves().len() == 1;
        let uci = move_to_uci(&mv);

        match movetext.position.clone().play(mv) {
            Ok(position) => {
                let gives_checkmate = position.is_checkmate();
                let suffix = if gives_checkmate {
                    "#"
                } else if position.is_check() {
                    "+"
                } else {
                    ""
                };
                movetext.moves.push(AppliedMove {
                    san: format!("{}{}", san.san, suffix),
                    uci,
                    color,
                    fen: fen_of(&position),
                    clock: None,
                    only_legal_move,
                    gives_checkmate,
                });
                movetext.position = position;
            }
            Err(e) => {
                movetext.error = Some(format!("ply {} ({}): {}", ply, san, e));
            }
        }

        ControlFlow::Continue(())
    }

    fn comment(
        &mut self,
        movetext: &mut Self::Movetext,
        comment: RawComment<'_>,
    ) -> ControlFlow<Self::Output> {
        if movetext.error.is_some() {
            return ControlFlow::Continue(());
        }
        if let Some(last) = movetext.moves.last_mut() {
            if last.clock.is_none() {
                last.clock = extract_clock(&String::from_utf8_lossy(comment.as_bytes()));
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        match movetext.error {
            Some(e) => Err(e),
            None => Ok(ParsedGame {
                tags: movetext.tags,
                start_fen: movetext.start_fen,
                moves: movetext.moves,
            }),
        }
    }
}

/// Parses and validates the first game of a transcript.
pub(crate) fn parse_transcript(transcript: &str) -> Result<ParsedGame, String> {
    let mut parser = TranscriptParser;
    let mut reader = pgn_reader::Reader::new(Cursor::new(transcript.as_bytes()));

    match reader.read_game(&mut parser) {
        Ok(Some(game)) => game,
        Ok(None) => Err("no game found".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Pulls a `[%clk ...]` annotation out of a comment
pub(crate) fn extract_clock(comment: &str) -> Option<String> {
    CLOCK_RE
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn start_position(fen: &str) -> Result<Chess, String> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|e| format!("invalid FEN tag {:?}: {}", fen, e))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| format!("illegal FEN tag {:?}: {}", fen, e))
}

fn fen_of(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Convert shakmaty Move to UCI string
fn move_to_uci(mv: &Move) -> String {
    match mv {
        Move::Normal {
            from, to, promotion, ..
        } => {
            let promo = promotion
                .map(|r| match r {
                    Role::Queen => "q",
                    Role::Rook => "r",
                    Role::Bishop => "b",
                    Role::Knight => "n",
                    _ => "",
                })
                .unwrap_or("");
            format!("{}{}{}", from, to, promo)
        }
        Move::EnPassant { from, to, .. } => format!("{}{}", from, to),
        Move::Castle { king, rook } => {
            let king_to = if rook.file() > king.file() {
                Square::from_coords(File::G, king.rank())
            } else {
                Square::from_coords(File::C, king.rank())
            };
            format!("{}{}", king, king_to)
        }
        Move::Put { .. } => String::new(),
    }
}
