//! G-code line classification
//!
//! A [`GcodeLine`] keeps the original text of a line next to what the merger
//! needs to know about it: the optional `N` number, the M/G codes, the tool
//! selection and every address word. Words are kept as [`Segment`]s together with
//! the surrounding whitespace and comments, so a line can be edited word by word and
//! written back without disturbing anything else.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use crate::error::HeuristicError;

/// Normalized M or G code number
///
/// `G01`, `G1` and `g1` all normalize to `1`; `G61.1` keeps its sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(String);

impl Code {
    /// Parse the numeric part of a code word. Returns `None` for anything that is
    /// not `digits` or `digits.digits`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (major, minor) = match text.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (text, None),
        };
        if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let major = major.trim_start_matches('0');
        let major = if major.is_empty() { "0" } else { major };

        match minor {
            None => Some(Self(major.to_string())),
            Some(minor) if minor.chars().all(|c| c.is_ascii_digit()) => {
                let minor = minor.trim_end_matches('0');
                if minor.is_empty() {
                    Some(Self(major.to_string()))
                } else {
                    Some(Self(format!("{major}.{minor}")))
                }
            }
            Some(_) => None,
        }
    }

    /// The normalized code text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this code equals the given normalized number
    pub fn is(&self, code: &str) -> bool {
        self.0 == code
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of codes built from configuration strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSet(HashSet<Code>);

impl CodeSet {
    /// Build a set, ignoring entries that are not code numbers
    pub fn from_strings<S: AsRef<str>>(codes: &[S]) -> Self {
        Self(codes.iter().filter_map(|c| Code::parse(c.as_ref())).collect())
    }

    /// Add the codes of another set
    pub fn extend(&mut self, other: &CodeSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn contains(&self, code: &Code) -> bool {
        self.0.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One address word, e.g. `X12.5` or `g01`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Address letter as written
    pub letter: char,
    /// Value text as written
    pub value: String,
}

impl Word {
    pub fn new(letter: char, value: impl Into<String>) -> Self {
        Self {
            letter,
            value: value.into(),
        }
    }

    /// Whether the word has the given address letter, ignoring case
    pub fn is(&self, letter: char) -> bool {
        self.letter.eq_ignore_ascii_case(&letter)
    }

    /// Numeric value of the word
    pub fn number(&self) -> Result<f64, HeuristicError> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| HeuristicError::InvalidNumber {
                letter: self.letter.to_ascii_uppercase(),
                value: self.value.clone(),
            })
    }

    /// Value as an M/G code
    pub fn code(&self) -> Option<Code> {
        Code::parse(&self.value)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.value)
    }
}

/// Piece of a line: an address word or the text around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Word(Word),
    /// Whitespace, comments and anything that is not a word
    Text(String),
}

/// Split a payload into words and the text between them.
pub fn tokenize(payload: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' => {
                text.push(c);
                for inner in chars.by_ref() {
                    text.push(inner);
                    if inner == ')' {
                        break;
                    }
                }
            }
            ';' => {
                text.push(c);
                text.extend(chars.by_ref());
            }
            c if c.is_ascii_alphabetic() => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                let mut value = String::new();
                let mut depth = 0usize;
                while let Some(&next) = chars.peek() {
                    let ends_word = depth == 0
                        && (next.is_whitespace()
                            || next == '('
                            || next == ';'
                            || next.is_ascii_alphabetic());
                    if ends_word {
                        break;
                    }
                    match next {
                        '[' => depth += 1,
                        ']' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    value.push(next);
                    chars.next();
                }
                segments.push(Segment::Word(Word::new(c, value)));
            }
            _ => text.push(c),
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

/// Render segments back to text
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Word(word) => {
                out.push(word.letter);
                out.push_str(&word.value);
            }
            Segment::Text(text) => out.push_str(text),
        }
    }
    out
}

fn line_number_regex() -> &'static Regex {
    static LINE_NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    LINE_NUMBER_REGEX
        .get_or_init(|| Regex::new(r"^\s*[Nn](\d+)[ \t]*").expect("invalid regex pattern"))
}

fn tool_comment_regex() -> &'static Regex {
    static TOOL_COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    TOOL_COMMENT_REGEX
        .get_or_init(|| Regex::new(r"^\(\s*[Tt]\d+").expect("invalid regex pattern"))
}

fn program_name_regex() -> &'static Regex {
    static PROGRAM_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    PROGRAM_NAME_REGEX
        .get_or_init(|| Regex::new(r"^(?:[Oo]\d+|:\d+|[Oo]<[^>]+>)").expect("invalid regex pattern"))
}

/// One classified line of post processor output
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeLine {
    raw: String,
    /// `N` number the line carried, if any
    pub line_number: Option<u32>,
    /// First M code on the line
    pub m_code: Option<Code>,
    /// First G code on the line
    pub g_code: Option<Code>,
    /// Tool selected by a `T` word
    pub tool_number: Option<u32>,
    payload: String,
    segments: Vec<Segment>,
}

impl GcodeLine {
    /// Classify a line. Never fails; unrecognized text is kept as-is.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']);

        let (line_number, payload) = match line_number_regex().captures(raw) {
            Some(caps) => {
                let whole = caps.get(0).map_or(0, |m| m.end());
                let number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
                match number {
                    Some(n) => (Some(n), &raw[whole..]),
                    None => (None, raw),
                }
            }
            None => (None, raw),
        };

        let segments = tokenize(payload);
        let mut m_code = None;
        let mut g_code = None;
        let mut tool_number = None;
        for word in segments.iter().filter_map(as_word) {
            match word.letter.to_ascii_uppercase() {
                'M' if m_code.is_none() => m_code = word.code(),
                'G' if g_code.is_none() => g_code = word.code(),
                'T' if tool_number.is_none() => {
                    tool_number = word.value.trim().parse::<u32>().ok();
                }
                _ => {}
            }
        }

        Self {
            raw: raw.to_string(),
            line_number,
            m_code,
            g_code,
            tool_number,
            payload: payload.to_string(),
            segments,
        }
    }

    /// The line as read
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The line without its `N` number. Identical to [`raw`](Self::raw) for
    /// unnumbered lines.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All address words in order
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.segments.iter().filter_map(as_word)
    }

    /// First word with the given letter
    pub fn word(&self, letter: char) -> Option<&Word> {
        self.words().find(|w| w.is(letter))
    }

    /// Every G code on the line
    pub fn g_codes(&self) -> Vec<Code> {
        self.codes('G')
    }

    /// Every M code on the line
    pub fn m_codes(&self) -> Vec<Code> {
        self.codes('M')
    }

    fn codes(&self, letter: char) -> Vec<Code> {
        self.words()
            .filter(|w| w.is(letter))
            .filter_map(Word::code)
            .collect()
    }

    /// Numeric value of the first word with the given letter
    pub fn value(&self, letter: char) -> Result<Option<f64>, HeuristicError> {
        self.word(letter).map(Word::number).transpose()
    }

    pub fn x(&self) -> Result<Option<f64>, HeuristicError> {
        self.value('X')
    }

    pub fn y(&self) -> Result<Option<f64>, HeuristicError> {
        self.value('Y')
    }

    pub fn z(&self) -> Result<Option<f64>, HeuristicError> {
        self.value('Z')
    }

    pub fn feed_rate(&self) -> Result<Option<f64>, HeuristicError> {
        self.value('F')
    }

    /// True when the line has any M code from `codes`
    pub fn has_m_code_in(&self, codes: &CodeSet) -> bool {
        self.m_codes().iter().any(|c| codes.contains(c))
    }

    /// True when the line has any G code from `codes`
    pub fn has_g_code_in(&self, codes: &CodeSet) -> bool {
        self.g_codes().iter().any(|c| codes.contains(c))
    }

    pub fn is_blank(&self) -> bool {
        self.payload.trim().is_empty()
    }

    /// `%` tape marker
    pub fn is_program_marker(&self) -> bool {
        self.raw.trim() == "%"
    }

    /// Line made of comments only
    pub fn is_comment(&self) -> bool {
        let trimmed = self.payload.trim();
        !trimmed.is_empty() && self.words().next().is_none()
    }

    /// Comment announcing a tool, e.g. `(T1 D=6. CR=0. - ZMIN=-5.)`
    pub fn is_tool_comment(&self) -> bool {
        tool_comment_regex().is_match(self.payload.trim_start())
    }

    /// Program number/name line, e.g. `O1001` or `:1001`
    pub fn is_program_name(&self) -> bool {
        program_name_regex().is_match(self.payload.trim_start())
    }
}

fn as_word(segment: &Segment) -> Option<&Word> {
    match segment {
        Segment::Word(word) => Some(word),
        Segment::Text(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_normalization() {
        assert_eq!(Code::parse("01"), Code::parse("1"));
        assert_eq!(Code::parse("00").map(|c| c.to_string()), Some("0".into()));
        assert_eq!(Code::parse("61.1").map(|c| c.to_string()), Some("61.1".into()));
        assert_eq!(Code::parse("1.0"), Code::parse("1"));
        assert!(Code::parse("").is_none());
        assert!(Code::parse("#1").is_none());
        assert!(Code::parse("1.x").is_none());
    }

    #[test]
    fn test_parse_numbered_line() {
        let line = GcodeLine::parse("N120 G01 X1.5 Y-2 F300 (cut)");
        assert_eq!(line.line_number, Some(120));
        assert_eq!(line.payload(), "G01 X1.5 Y-2 F300 (cut)");
        assert_eq!(line.g_code, Code::parse("1"));
        assert_eq!(line.x().unwrap(), Some(1.5));
        assert_eq!(line.y().unwrap(), Some(-2.0));
        assert_eq!(line.z().unwrap(), None);
        assert_eq!(line.feed_rate().unwrap(), Some(300.0));
    }

    #[test]
    fn test_parse_unnumbered_line_keeps_raw() {
        let line = GcodeLine::parse("  G0 X0 Y0");
        assert_eq!(line.line_number, None);
        assert_eq!(line.payload(), "  G0 X0 Y0");
        assert_eq!(render(line.segments()), "  G0 X0 Y0");
    }

    #[test]
    fn test_parse_tool_line() {
        let line = GcodeLine::parse("N30 T12 M06");
        assert_eq!(line.tool_number, Some(12));
        assert_eq!(line.m_code, Code::parse("6"));
    }

    #[test]
    fn test_compact_words() {
        let line = GcodeLine::parse("N5G1X10Y20Z-1F100");
        assert_eq!(line.line_number, Some(5));
        assert_eq!(line.words().count(), 5);
        assert_eq!(line.z().unwrap(), Some(-1.0));
        assert_eq!(render(line.segments()), "G1X10Y20Z-1F100");
    }

    #[test]
    fn test_comments_are_not_words() {
        let line = GcodeLine::parse("(T1 D=6 - FLAT END MILL) ; more X text");
        assert!(line.is_comment());
        assert!(line.is_tool_comment());
        assert!(line.tool_number.is_none());
        assert_eq!(line.words().count(), 0);
    }

    #[test]
    fn test_expression_value() {
        let line = GcodeLine::parse("G1 Z[#100+1] F#2");
        let z = line.word('Z').unwrap();
        assert_eq!(z.value, "[#100+1]");
        assert!(line.z().is_err());
        assert!(matches!(
            line.feed_rate(),
            Err(HeuristicError::InvalidNumber { letter: 'F', .. })
        ));
    }

    #[test]
    fn test_program_markers() {
        assert!(GcodeLine::parse("%").is_program_marker());
        assert!(GcodeLine::parse("O1001 (PART)").is_program_name());
        assert!(GcodeLine::parse(":0042").is_program_name());
        assert!(!GcodeLine::parse("G0 X1").is_program_name());
        assert!(GcodeLine::parse("   ").is_blank());
    }

    #[test]
    fn test_code_sets() {
        let set = CodeSet::from_strings(&["30", "05", "bogus"]);
        let line = GcodeLine::parse("N90 M5 M9");
        assert!(line.has_m_code_in(&set));
        assert!(!GcodeLine::parse("M9").has_m_code_in(&set));
        assert!(!GcodeLine::parse("G30 Z0").has_m_code_in(&set));
    }

    #[test]
    fn test_carriage_return_stripped() {
        let line = GcodeLine::parse("N10 G90\r");
        assert_eq!(line.payload(), "G90");
    }
}
