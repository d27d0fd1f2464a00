//! SAN interpretation - maps normalized move phrases to algebraic notation
//!
//! Shapes are tried in a fixed order, first match wins:
//! 1. Castling (king side / queen side, or spoken "o o")
//! 2. Pawn push ("e four")
//! 3. Pawn capture ("d takes e five")
//! 4. Piece move or capture ("knight f three", "bishop takes e five")
//! 5. Literal residue, for users who just spell out the SAN
//!
//! Promotion, capture and check/mate flags are read once per utterance into a
//! [`Phrase`] before any shape is tried.

use std::fmt;

use crate::normalize::{clean, tokenize};

const PROMOTE_WORDS: [&str; 3] = ["promote", "promotion", "promotes"];
const CAPTURE_WORDS: [&str; 4] = ["takes", "capture", "captures", "x"];
const MATE_WORDS: [&str; 2] = ["checkmate", "mate"];
const CHECK_WORD: &str = "check";
const PROMOTION_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Piece {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "king" => Some(Piece::King),
            "queen" => Some(Piece::Queen),
            "rook" => Some(Piece::Rook),
            "bishop" => Some(Piece::Bishop),
            "knight" => Some(Piece::Knight),
            _ => None,
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'K' => Some(Piece::King),
            'Q' => Some(Piece::Queen),
            'R' => Some(Piece::Rook),
            'B' => Some(Piece::Bishop),
            'N' => Some(Piece::Knight),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Piece::King => 'K',
            Piece::Queen => 'Q',
            Piece::Rook => 'R',
            Piece::Bishop => 'B',
            Piece::Knight => 'N',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Piece::King => "king",
            Piece::Queen => "queen",
            Piece::Rook => "rook",
            Piece::Bishop => "bishop",
            Piece::Knight => "knight",
        }
    }

    /// Pawns never promote to a king
    fn is_promotable(self) -> bool {
        self != Piece::King
    }
}

/// A board square, file a-h and rank 1-8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Square {
    file: char,
    rank: char,
}

impl Square {
    /// Build from a (file, rank) token pair. Both halves must validate.
    pub fn from_tokens(file: &str, rank: &str) -> Option<Self> {
        Some(Self {
            file: parse_file(file)?,
            rank: parse_rank(rank)?,
        })
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file, self.rank)
    }
}

fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn parse_file(token: &str) -> Option<char> {
    single_char(token).filter(|c| ('a'..='h').contains(c))
}

fn parse_rank(token: &str) -> Option<char> {
    single_char(token).filter(|c| ('1'..='8').contains(c))
}

/// Check/mate suffix. Mate implies check, so only one is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    None,
    Check,
    Mate,
}

impl Suffix {
    pub fn as_str(self) -> &'static str {
        match self {
            Suffix::None => "",
            Suffix::Check => "+",
            Suffix::Mate => "#",
        }
    }
}

/// One utterance with its derived flags. Built once, read by every matcher.
#[derive(Debug, Clone)]
pub struct Phrase {
    cleaned: String,
    tokens: Vec<String>,
    capture: Option<usize>,
    suffix: Suffix,
    promotion: Option<Piece>,
}

impl Phrase {
    /// From a raw transcript; keeps the cleaned text for the literal fallback
    pub fn from_utterance(raw: &str) -> Self {
        let cleaned = clean(raw);
        let tokens = tokenize(&cleaned);
        Self::build(cleaned, tokens)
    }

    /// From tokens that were already normalized
    pub fn from_tokens(tokens: &[String]) -> Self {
        Self::build(tokens.join(" "), tokens.to_vec())
    }

    fn build(cleaned: String, tokens: Vec<String>) -> Self {
        let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
        let suffix = if has(&MATE_WORDS[..]) {
            Suffix::Mate
        } else if has(&[CHECK_WORD][..]) {
            Suffix::Check
        } else {
            Suffix::None
        };
        let capture = tokens
            .iter()
            .position(|t| CAPTURE_WORDS.contains(&t.as_str()));
        let promotion = scan_promotion(&tokens);

        Self {
            cleaned,
            tokens,
            capture,
            suffix,
            promotion,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Index of the first capture keyword
    pub fn capture(&self) -> Option<usize> {
        self.capture
    }

    pub fn suffix(&self) -> Suffix {
        self.suffix
    }

    pub fn promotion(&self) -> Option<Piece> {
        self.promotion
    }

    fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    fn square_at(&self, index: usize) -> Option<Square> {
        Square::from_tokens(self.token(index)?, self.token(index + 1)?)
    }
}

/// First promote keyword, then up to three tokens after it; the last piece
/// word inside that window is the promotion.
fn scan_promotion(tokens: &[String]) -> Option<Piece> {
    let start = tokens
        .iter()
        .position(|t| PROMOTE_WORDS.contains(&t.as_str()))?;
    tokens[start + 1..]
        .iter()
        .take(PROMOTION_WINDOW)
        .filter_map(|t| Piece::from_word(t))
        .filter(|p| p.is_promotable())
        .last()
}

/// The recognized shape of a move phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveShape {
    Castle { long: bool },
    PawnPush { to: Square, promotion: Option<Piece> },
    PawnCapture { from_file: char, to: Square },
    PieceMove { piece: Piece, capture: bool, to: Square },
    /// A piece was named but no destination square was heard
    MissingSquare { piece: Piece },
    Literal(String),
}

impl MoveShape {
    /// Render to SAN using the phrase's promotion and suffix flags
    pub fn to_san(&self, phrase: &Phrase) -> String {
        let promo = |own: Option<Piece>| {
            own.map(|p| format!("={}", p.letter()))
                .unwrap_or_default()
        };
        let suffix = phrase.suffix().as_str();

        match self {
            MoveShape::Castle { long: false } => "O-O".to_string(),
            MoveShape::Castle { long: true } => "O-O-O".to_string(),
            MoveShape::PawnPush { to, promotion } => {
                format!("{}{}{}", to, promo(*promotion), suffix)
            }
            MoveShape::PawnCapture { from_file, to } => {
                format!("{}x{}{}{}", from_file, to, promo(phrase.promotion()), suffix)
            }
            MoveShape::PieceMove { piece, capture, to } => format!(
                "{}{}{}{}{}",
                piece.letter(),
                if *capture { "x" } else { "" },
                to,
                promo(phrase.promotion()),
                suffix
            ),
            MoveShape::MissingSquare { .. } => String::new(),
            MoveShape::Literal(residue) => residue.clone(),
        }
    }
}

type Matcher = fn(&Phrase) -> Option<MoveShape>;

/// Matchers in priority order
const MATCHERS: [(&str, Matcher); 5] = [
    ("castle", match_castle),
    ("pawn push", match_pawn_push),
    ("pawn capture", match_pawn_capture),
    ("piece move", match_piece_move),
    ("literal", match_literal),
];

fn match_castle(phrase: &Phrase) -> Option<MoveShape> {
    let text = phrase.tokens.join(" ");
    let castle = text.contains("castle");

    let king_side = (castle
        && (text.contains("king side") || text.contains("kingside") || text.contains("short")))
        || text == "o o"
        || text == "oo";
    if king_side {
        return Some(MoveShape::Castle { long: false });
    }

    let queen_side = (castle
        && (text.contains("queen side") || text.contains("queenside") || text.contains("long")))
        || text == "o o o"
        || text == "ooo";
    queen_side.then_some(MoveShape::Castle { long: true })
}

fn match_pawn_push(phrase: &Phrase) -> Option<MoveShape> {
    let to = phrase.square_at(0)?;
    let promotion = phrase.promotion().or_else(|| {
        phrase
            .token(2)
            .and_then(Piece::from_word)
            .filter(|p| p.is_promotable())
    });
    Some(MoveShape::PawnPush { to, promotion })
}

fn match_pawn_capture(phrase: &Phrase) -> Option<MoveShape> {
    let from_file = parse_file(phrase.token(0)?)?;
    let capture = phrase.capture()?;
    let to = phrase.square_at(capture + 1)?;
    Some(MoveShape::PawnCapture { from_file, to })
}

fn match_piece_move(phrase: &Phrase) -> Option<MoveShape> {
    let piece = phrase.tokens.iter().find_map(|t| Piece::from_word(t))?;
    // Origin squares ("knight from f three to e five") are not told apart;
    // the last square heard is the destination.
    let to = phrase
        .tokens
        .windows(2)
        .filter_map(|pair| Square::from_tokens(&pair[0], &pair[1]))
        .last();

    Some(match to {
        Some(to) => MoveShape::PieceMove {
            piece,
            capture: phrase.capture().is_some(),
            to,
        },
        None => MoveShape::MissingSquare { piece },
    })
}

fn match_literal(phrase: &Phrase) -> Option<MoveShape> {
    let residue: String = phrase
        .cleaned
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+#=-".contains(*c))
        .collect();
    (!residue.is_empty()).then_some(MoveShape::Literal(residue))
}

/// Result of running the matchers over one phrase
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub matcher: &'static str,
    pub shape: MoveShape,
    pub san: String,
}

/// Run the matchers in order and keep the first hit
pub fn analyze(phrase: &Phrase) -> Option<Interpretation> {
    MATCHERS.iter().find_map(|(name, matcher)| {
        matcher(phrase).map(|shape| Interpretation {
            matcher: *name,
            san: shape.to_san(phrase),
            shape,
        })
    })
}

/// Interpret normalized tokens. Empty string means "not understood".
pub fn interpret(tokens: &[String]) -> String {
    analyze(&Phrase::from_tokens(tokens))
        .map(|i| i.san)
        .unwrap_or_default()
}

/// Interpret a raw transcript. Empty string means "not understood".
#[hotpath::measure]
pub fn interpret_utterance(raw: &str) -> String {
    analyze(&Phrase::from_utterance(raw))
        .map(|i| i.san)
        .unwrap_or_default()
}

/// Spoken form of a SAN string, e.g. "Nxe5+" -> "knight takes e5 check"
pub fn describe(san: &str) -> String {
    let (body, ending) = if let Some(body) = san.strip_suffix('#') {
        (body, Some("checkmate"))
    } else if let Some(body) = san.strip_suffix('+') {
        (body, Some("check"))
    } else {
        (san, None)
    };
    let (body, promotion) = match body.split_once('=') {
        Some((body, letter)) => (
            body,
            letter.chars().next().and_then(Piece::from_letter),
        ),
        None => (body, None),
    };

    let mut words: Vec<String> = Vec::new();
    match body {
        "O-O" => words.push("castles king side".into()),
        "O-O-O" => words.push("castles queen side".into()),
        _ => {
            let mut rest = body;
            if let Some(piece) = rest.chars().next().and_then(Piece::from_letter) {
                words.push(piece.name().into());
                rest = &rest[1..];
            }
            match rest.split_once('x') {
                Some((from, to)) => {
                    if !from.is_empty() {
                        words.push(from.into());
                    }
                    words.push("takes".into());
                    words.push(to.into());
                }
                None if !rest.is_empty() => words.push(rest.into()),
                None => {}
            }
        }
    }
    if let Some(piece) = promotion {
        words.push(format!("promotes to {}", piece.name()));
    }
    if let Some(ending) = ending {
        words.push(ending.into());
    }
    words.join(" ")
}
