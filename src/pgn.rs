/// PGN text handling: entity decoding and header tag parsing
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Marker for text that carries a PGN header section
pub const HEADER_MARKER: &str = "[Event";
const SITE_MARKER: &str = "[Site";

pub const UNKNOWN_PLAYER: &str = "Unknown";
const DEFAULT_EVENT: &str = "Game";

static HEADER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]+)"\]"#).expect("valid header regex"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(quot|amp|lt|gt|apos|nbsp|#[0-9]+|#[xX][0-9a-fA-F]+);").expect("valid entity regex")
});

/// Outcome of a game as written in the `Result` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameResult {
    #[serde(rename = "1-0")]
    WhiteWins,
    #[serde(rename = "0-1")]
    BlackWins,
    #[serde(rename = "1/2-1/2")]
    Draw,
    #[default]
    #[serde(rename = "*")]
    Unfinished,
}

impl GameResult {
    pub fn parse(value: &str) -> GameResult {
        match value.trim() {
            "1-0" => GameResult::WhiteWins,
            "0-1" => GameResult::BlackWins,
            "1/2-1/2" | "½-½" => GameResult::Draw,
            _ => GameResult::Unfinished,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unfinished => "*",
        }
    }
}

/// The header fields the history cares about
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub white: String,
    pub black: String,
    pub result: GameResult,
    pub event: String,
}

impl GameSummary {
    pub fn from_pgn(pgn: &str) -> GameSummary {
        let mut headers = parse_headers(pgn);
        let mut take = |key: &str| headers.remove(key).filter(|v| !v.trim().is_empty());

        GameSummary {
            white: take("White").unwrap_or_else(|| UNKNOWN_PLAYER.to_string()),
            black: take("Black").unwrap_or_else(|| UNKNOWN_PLAYER.to_string()),
            result: take("Result").map_or(GameResult::Unfinished, |r| GameResult::parse(&r)),
            event: take("Event").unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        }
    }
}

/// Parse `[Key "Value"]` tags. Later duplicates win.
pub fn parse_headers(pgn: &str) -> HashMap<String, String> {
    HEADER_TAG
        .captures_iter(pgn)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Whether a probed element's text looks like a PGN
pub fn looks_like_pgn(text: &str) -> bool {
    text.contains(HEADER_MARKER)
}

/// Stricter check used when scanning arbitrary text areas
pub fn looks_like_full_pgn(text: &str) -> bool {
    text.contains(HEADER_MARKER) && text.contains(SITE_MARKER)
}

/// Decode the HTML entities a scraped PGN may still carry
///
/// Single pass, so `&amp;lt;` becomes `&lt;` rather than `<`.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "quot" => "\"".to_string(),
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => "\u{a0}".to_string(),
                _ => decode_numeric(&name[1..]).unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

fn decode_numeric(reference: &str) -> Option<String> {
    let code = match reference.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => reference.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(String::from)
}

/// Entities the share dialog may have encoded twice, replaced in this order
const SECOND_PASS: [(&str, &str); 4] = [("&quot;", "\""), ("&amp;", "&"), ("&lt;", "<"), ("&gt;", ">")];

/// Canonical form of scraped PGN text
///
/// A full entity decode, then a second pass over the common entities so
/// double-encoded text such as `&amp;quot;` comes out as `"`.
pub fn normalize(raw: &str) -> String {
    let decoded = decode_entities(raw);
    SECOND_PASS
        .iter()
        .fold(decoded, |text, (entity, plain)| text.replace(entity, plain))
        .trim()
        .to_string()
}
