//! Puzzle to PGN conversion.
//!
//! A puzzle row is turned into a [`GameRecord`]: the starting position plus a
//! tree of [`GameNode`]s whose first children form the main line. The record
//! is rendered with [`serialize`] as a standard PGN game (tag pairs, blank
//! line, movetext terminated by the result marker).

use log::{trace, warn};
use shakmaty::{
    fen::Fen, san::SanPlus, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move,
    Position,
};

use crate::error::{Error, Result};

const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Maximum line width of rendered movetext.
const MOVETEXT_COLUMNS: usize = 80;

/// One applied move and the continuations that follow it.
/// `variations[0]` is the main continuation, the rest are sidelines.
#[derive(Debug, Clone)]
pub struct GameNode {
    san: SanPlus,
    uci: UciMove,
    variations: Vec<GameNode>,
}

impl GameNode {
    /// Play `mv` on `pos` and record it. `mv` must be legal in `pos`.
    pub fn from_move(pos: &mut Chess, mv: &Move) -> Self {
        let uci = mv.to_uci(CastlingMode::Standard);
        let san = SanPlus::from_move_and_play_unchecked(pos, mv);
        Self {
            san,
            uci,
            variations: Vec::new(),
        }
    }

    pub fn san(&self) -> &SanPlus {
        &self.san
    }

    pub fn uci(&self) -> &UciMove {
        &self.uci
    }

    pub fn variations(&self) -> &[GameNode] {
        &self.variations
    }

    pub fn main_variation(&self) -> Option<&GameNode> {
        self.variations.first()
    }

    /// Make `node` the main continuation, demoting the previous one to a sideline.
    pub fn add_main_variation(&mut self, node: GameNode) -> &mut GameNode {
        self.variations.insert(0, node);
        &mut self.variations[0]
    }

    pub fn add_variation(&mut self, node: GameNode) -> &mut GameNode {
        self.variations.push(node);
        let last = self.variations.len() - 1;
        &mut self.variations[last]
    }
}

/// A game tree rooted at a starting position, with PGN tag pairs.
#[derive(Debug, Clone)]
pub struct GameRecord {
    headers: Vec<(String, String)>,
    start: Chess,
    variations: Vec<GameNode>,
}

impl GameRecord {
    /// Create an empty game from `start`, with the seven tag roster filled
    /// with unknown values and `SetUp`/`FEN` tags for non-standard starts.
    pub fn new(start: Chess) -> Self {
        let mut headers: Vec<(String, String)> = [
            ("Event", "?"),
            ("Site", "?"),
            ("Date", "????.??.??"),
            ("Round", "?"),
            ("White", "?"),
            ("Black", "?"),
            ("Result", "*"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let fen = Fen::from_position(start.clone(), EnPassantMode::Legal).to_string();
        if fen != STARTING_FEN {
            headers.push(("SetUp".to_string(), "1".to_string()));
            headers.push(("FEN".to_string(), fen));
        }

        Self {
            headers,
            start,
            variations: Vec::new(),
        }
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((key.to_string(), value.to_string())),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn start_position(&self) -> &Chess {
        &self.start
    }

    pub fn variations(&self) -> &[GameNode] {
        &self.variations
    }

    pub fn add_main_variation(&mut self, node: GameNode) -> &mut GameNode {
        self.variations.insert(0, node);
        &mut self.variations[0]
    }

    pub fn add_variation(&mut self, node: GameNode) -> &mut GameNode {
        self.variations.push(node);
        let last = self.variations.len() - 1;
        &mut self.variations[last]
    }

    /// Nodes of the main line, in play order.
    pub fn mainline(&self) -> impl Iterator<Item = &GameNode> {
        std::iter::successors(self.variations.first(), |node| node.main_variation())
    }

    pub fn mainline_len(&self) -> usize {
        self.mainline().count()
    }

    /// Position reached at the end of the main line.
    pub fn end_position(&self) -> Chess {
        let mut pos = self.start.clone();
        for node in self.mainline() {
            match node.uci.to_move(&pos) {
                Ok(mv) => pos.play_unchecked(&mv),
                Err(_) => break,
            }
        }
        pos
    }
}

/// Build a game whose main line is `moves` (whitespace separated UCI) played
/// from `fen`, labelled with `event`.
pub fn to_game_record(fen: &str, moves: &str, event: &str) -> Result<GameRecord> {
    let start = parse_position(fen, event)?;
    let mut pos = start.clone();
    let mut line = Vec::new();

    for (ply, token) in moves.split_whitespace().enumerate() {
        let invalid = |reason: String| Error::InvalidMove {
            puzzle: event.to_string(),
            ply,
            uci: token.to_string(),
            reason,
        };
        let uci = UciMove::from_ascii(token.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let mv = uci.to_move(&pos).map_err(|e| invalid(e.to_string()))?;
        line.push(GameNode::from_move(&mut pos, &mv));
    }

    if line.is_empty() {
        return Err(Error::InvalidMove {
            puzzle: event.to_string(),
            ply: 0,
            uci: String::new(),
            reason: "empty move sequence".to_string(),
        });
    }
    trace!("Built {} plies for puzzle {}", line.len(), event);

    let mut record = GameRecord::new(start);
    record.set_header("Event", event);

    // Nest the flat line back to front so each node owns its successor.
    let mut chain: Option<GameNode> = None;
    for mut node in line.into_iter().rev() {
        if let Some(next) = chain.take() {
            node.variations.push(next);
        }
        chain = Some(node);
    }
    if let Some(first) = chain {
        record.add_main_variation(first);
    }

    Ok(record)
}

fn parse_position(fen: &str, puzzle: &str) -> Result<Chess> {
    let invalid = |reason: String| Error::InvalidPosition {
        puzzle: puzzle.to_string(),
        reason,
    };
    let fen = Fen::from_ascii(fen.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
    match fen.into_position::<Chess>(CastlingMode::Standard) {
        Ok(pos) => Ok(pos),
        Err(e) => {
            warn!(
                "Position error in puzzle {}: {}, relaxing castling and material checks",
                puzzle, e
            );
            e.ignore_invalid_castling_rights()
                .or_else(|e| e.ignore_too_much_material())
                .map_err(|e| invalid(e.to_string()))
        }
    }
}

/// Render `record` as PGN text, without a trailing newline.
pub fn serialize(record: &GameRecord) -> String {
    let mut out = String::new();
    for (key, value) in &record.headers {
        out.push('[');
        out.push_str(key);
        out.push_str(" \"");
        out.push_str(&escape_tag_value(value));
        out.push_str("\"]\n");
    }
    out.push('\n');

    let mut movetext = Movetext::default();
    movetext.children(
        &record.variations,
        record.start.fullmoves().get(),
        record.start.turn(),
        true,
    );
    movetext.push(record.header("Result").unwrap_or("*").to_string());
    out.push_str(&movetext.wrap(MOVETEXT_COLUMNS));
    out
}

fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Default)]
struct Movetext {
    tokens: Vec<String>,
    open_pending: bool,
}

impl Movetext {
    fn push(&mut self, token: String) {
        if self.open_pending {
            self.open_pending = false;
            self.tokens.push(format!("({}", token));
        } else {
            self.tokens.push(token);
        }
    }

    fn open(&mut self) {
        self.open_pending = true;
    }

    fn close(&mut self) {
        if let Some(last) = self.tokens.last_mut() {
            last.push(')');
        }
    }

    fn mv(&mut self, node: &GameNode, fullmove: u32, turn: Color, force_number: bool) {
        match turn {
            Color::White => self.push(format!("{}.", fullmove)),
            Color::Black if force_number => self.push(format!("{}...", fullmove)),
            Color::Black => {}
        }
        self.push(node.san.to_string());
    }

    fn children(&mut self, variations: &[GameNode], fullmove: u32, turn: Color, force_number: bool) {
        let Some((main, sidelines)) = variations.split_first() else {
            return;
        };
        let (next_fullmove, next_turn) = advance(fullmove, turn);

        self.mv(main, fullmove, turn, force_number);
        for side in sidelines {
            self.open();
            self.mv(side, fullmove, turn, true);
            self.children(&side.variations, next_fullmove, next_turn, false);
            self.close();
        }
        self.children(&main.variations, next_fullmove, next_turn, !sidelines.is_empty());
    }

    fn wrap(&self, columns: usize) -> String {
        let mut out = String::new();
        let mut line_len = 0;
        for token in &self.tokens {
            if line_len > 0 && line_len + 1 + token.len() > columns {
                out.push('\n');
                line_len = 0;
            } else if line_len > 0 {
                out.push(' ');
                line_len += 1;
            }
            out.push_str(token);
            line_len += token.len();
        }
        out
    }
}

fn advance(fullmove: u32, turn: Color) -> (u32, Color) {
    match turn {
        Color::White => (fullmove, Color::Black),
        Color::Black => (fullmove + 1, Color::White),
    }
}
