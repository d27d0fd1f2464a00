//! Move application - the board, legality and game-over checks
//!
//! The dialogue never looks inside a SAN string; it hands the string to a
//! [`MoveApplier`] and only learns whether the move was legal.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, EnPassantMode, Move, Position};

const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;

/// What to play: a spoken SAN or an engine's coordinate move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveSpec {
    San(String),
    Uci(String),
}

/// A move that was accepted and played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    /// Canonical SAN including the check or mate suffix
    pub san: String,
    pub uci: String,
}

pub trait MoveApplier {
    /// Play the move if legal. `None` means it was rejected.
    fn apply_move(&mut self, spec: &MoveSpec) -> Option<MoveResult>;
    fn is_checkmate(&self) -> bool;
    /// Draws that end the game without a claim: stalemate, insufficient
    /// material and the seventy-five move rule. Nobody is asked about the
    /// fifty-move rule and repetitions are not tracked.
    fn is_draw(&self) -> bool;
    /// FEN of the current position, for the engine
    fn position_fen(&self) -> String;
    fn side_to_move(&self) -> Color;
    fn reset(&mut self);
}

/// Standard chess game backed by shakmaty
#[derive(Debug, Clone, Default)]
pub struct Game {
    position: Chess,
    history: Vec<String>,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves played so far, in SAN
    pub fn history(&self) -> &[String] {
        &self.history
    }

    #[cfg(test)]
    fn from_fen(fen: &str) -> Option<Self> {
        let fen: Fen = fen.parse().ok()?;
        let position = fen.into_position(shakmaty::CastlingMode::Standard).ok()?;
        Some(Self {
            position,
            history: Vec::new(),
        })
    }

    fn resolve(&self, spec: &MoveSpec) -> Option<Move> {
        match spec {
            MoveSpec::San(text) => san_candidates(text)
                .into_iter()
                .find_map(|candidate| {
                    let san: San = candidate.parse().ok()?;
                    san.to_move(&self.position).ok()
                }),
            MoveSpec::Uci(text) => {
                let uci: UciMove = text.parse().ok()?;
                uci.to_move(&self.position).ok()
            }
        }
    }
}

impl MoveApplier for Game {
    fn apply_move(&mut self, spec: &MoveSpec) -> Option<MoveResult> {
        let mv = self.resolve(spec)?;
        let san = San::from_move(&self.position, mv.clone()).to_string();
        let uci = mv.to_uci(shakmaty::CastlingMode::Standard).to_string();
        let next = self.position.clone().play(mv).ok()?;

        let suffix = if next.is_checkmate() {
            "#"
        } else if next.is_check() {
            "+"
        } else {
            ""
        };
        let san = format!("{}{}", san, suffix);

        self.position = next;
        self.history.push(san.clone());
        Some(MoveResult { san, uci })
    }

    fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn is_draw(&self) -> bool {
        self.position.is_stalemate()
            || self.position.is_insufficient_material()
            || self.position.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES
    }

    fn position_fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The SAN as given, then with piece and castling letters uppercased, so a
/// literal "nf3" or "o-o" still resolves. Check marks are dropped; the
/// board works those out itself.
fn san_candidates(text: &str) -> Vec<String> {
    let bare = text.trim().trim_end_matches(['+', '#', '!', '?']);
    let mut candidates = vec![bare.to_string()];

    let castle = bare.replace('0', "o");
    if castle == "o-o" || castle == "o-o-o" {
        candidates.push(castle.to_uppercase());
    }

    let mut chars = bare.chars();
    if let Some(first) = chars.next() {
        if "nrqk".contains(first) || (first == 'b' && bare.len() > 2) {
            let mut fixed: String = first.to_ascii_uppercase().to_string();
            fixed.extend(chars);
            candidates.push(fixed);
        }
    }
    if let Some((body, promo)) = bare.split_once('=') {
        candidates.push(format!("{}={}", body, promo.to_uppercase()));
    }
    candidates
}
