//! Rapid-move rewriting
//!
//! Some post processors emit every positioning move as a feed move. The rewriter
//! estimates the feed height (the Z above which the tool cannot touch material) and
//! turns feed moves that stay above it into rapids. It only ever edits words within
//! a line: no line is dropped or added.

use crate::error::HeuristicError;
use crate::line::{render, Code, CodeSet, GcodeLine, Segment, Word};
use postmerge_settings::RapidSettings;

/// Margin added when a cutting move forces the feed height up
pub const FEED_HEIGHT_MARGIN: f64 = 0.001;

/// Modal motion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    /// No motion mode seen yet, or cancelled with G80
    #[default]
    Unknown,
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
    /// Canned cycle (G73, G76, G81-G89)
    Canned,
}

impl Motion {
    /// Motion mode selected by a G code, if it selects one
    pub fn from_code(code: &Code) -> Option<Self> {
        match code.as_str() {
            "0" => Some(Motion::Rapid),
            "1" => Some(Motion::Linear),
            "2" => Some(Motion::ArcCw),
            "3" => Some(Motion::ArcCcw),
            "80" => Some(Motion::Unknown),
            "73" | "76" | "81" | "82" | "83" | "84" | "85" | "86" | "87" | "88" | "89" => {
                Some(Motion::Canned)
            }
            _ => None,
        }
    }

    /// G word that selects this mode
    pub fn word(self) -> Option<&'static str> {
        match self {
            Motion::Rapid => Some("0"),
            Motion::Linear => Some("1"),
            Motion::ArcCw => Some("2"),
            Motion::ArcCcw => Some("3"),
            Motion::Unknown | Motion::Canned => None,
        }
    }

    /// Moves at the programmed feed rate
    pub fn is_feed(self) -> bool {
        matches!(self, Motion::Linear | Motion::ArcCw | Motion::ArcCcw)
    }

    /// Part of the group the rewriter understands (G0-G3)
    fn is_basic(self) -> bool {
        self.word().is_some()
    }
}

/// Lock codes for a rewriter; `None` from [`from_settings`](Self::from_settings)
/// means rewriting is off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RapidOptions {
    pub lock_on: CodeSet,
    pub lock_off: CodeSet,
}

impl RapidOptions {
    pub fn from_settings(settings: &RapidSettings) -> Option<Self> {
        settings.enabled.then(|| Self {
            lock_on: CodeSet::from_strings(&settings.lock_on_m_codes),
            lock_off: CodeSet::from_strings(&settings.lock_off_m_codes),
        })
    }
}

/// Everything the rewriter knows about the machine at the current line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RapidMoveState {
    /// Z after the last line; `None` after home or machine-coordinate moves
    pub current_z: Option<f64>,
    /// Z before the last Z change
    pub previous_z: Option<f64>,
    /// Estimated feed height
    pub feed_height: Option<f64>,
    /// The estimate has been checked against a real cut
    pub feed_height_confirmed: bool,
    /// Active feed rate in the source program
    pub current_feed: Option<f64>,
    /// F value text active in the source program
    pub current_feed_text: Option<String>,
    /// F value text active in the output program
    pub emitted_feed_text: Option<String>,
    /// Modal motion in the source program
    pub motion: Motion,
    /// Modal motion in the output program
    pub output_motion: Motion,
    /// Rewriting suspended by a lock M code
    pub locked: bool,
    /// G91 is active
    pub incremental: bool,
}

impl RapidMoveState {
    fn move_z(&mut self, z: Option<f64>) {
        if z != self.current_z {
            self.previous_z = self.current_z;
        }
        self.current_z = z;
    }

    fn at_or_above_feed_height(&self, z: Option<f64>) -> bool {
        matches!((z, self.feed_height), (Some(z), Some(fh)) if z >= fh)
    }

    fn has_usable_feed(&self) -> bool {
        self.current_feed.is_some_and(|f| f > 0.0)
    }
}

/// Codes after which the Z position is no longer known from the program text
fn resets_position(code: &Code) -> bool {
    matches!(code.as_str(), "28" | "30" | "53" | "92")
}

/// Non-modal codes that take the line's axis words for themselves. A motion word
/// or feed added to such a line would make it invalid.
fn consumes_axes(code: &Code) -> bool {
    matches!(code.as_str(), "10" | "28" | "30" | "53" | "92")
}

/// Rewrites feed moves above the feed height as rapids, line by line
#[derive(Debug, Clone)]
pub struct RapidMoveRewriter {
    options: RapidOptions,
    state: RapidMoveState,
}

impl RapidMoveRewriter {
    pub fn new(options: RapidOptions) -> Self {
        Self {
            options,
            state: RapidMoveState::default(),
        }
    }

    pub fn state(&self) -> &RapidMoveState {
        &self.state
    }

    /// Process one line. Returns the new payload when the line changes.
    ///
    /// All values are read before any state changes; on error the state is left
    /// as it was and the caller copies the line through.
    pub fn rewrite(&mut self, line: &GcodeLine) -> Result<Option<String>, HeuristicError> {
        let x = line.x()?;
        let y = line.y()?;
        let z = line.z()?;
        let feed = line.feed_rate()?;
        let feed_word = line.word('F');
        if let (Some(f), Some(word)) = (feed, feed_word) {
            if f < 0.0 {
                return Err(HeuristicError::NegativeFeed {
                    value: word.value.clone(),
                });
            }
        }

        for code in line.m_codes() {
            if self.options.lock_on.contains(&code) {
                tracing::debug!("Rapid rewriting locked by M{}", code);
                self.state.locked = true;
            } else if self.options.lock_off.contains(&code) {
                tracing::debug!("Rapid rewriting unlocked by M{}", code);
                self.state.locked = false;
            }
        }

        let mut explicit: Option<Motion> = None;
        let mut passthrough = false;
        let mut position_lost = false;
        let mut non_modal = false;
        for code in line.g_codes() {
            if let Some(motion) = Motion::from_code(&code) {
                explicit = Some(motion);
                passthrough |= !motion.is_basic();
            } else if code.is("90") {
                self.state.incremental = false;
            } else if code.is("91") {
                self.state.incremental = true;
            } else {
                passthrough = true;
                position_lost |= resets_position(&code);
                non_modal |= consumes_axes(&code);
            }
        }

        if let (Some(f), Some(word)) = (feed, feed_word) {
            self.state.current_feed = Some(f);
            self.state.current_feed_text = Some(word.value.trim().to_string());
        }
        if let Some(motion) = explicit {
            self.state.motion = motion;
        }
        let motion = self.state.motion;
        let has_xy = x.is_some() || y.is_some();
        let moves = has_xy || z.is_some();

        if passthrough || self.state.locked || self.state.incremental || !moves {
            if position_lost || matches!(motion, Motion::Canned) {
                self.state.move_z(None);
            } else if z.is_some() {
                let z = if self.state.incremental { None } else { z };
                self.state.move_z(z);
            }
            if non_modal {
                if let Some(motion) = explicit {
                    self.state.output_motion = motion;
                }
                if let Some(word) = feed_word {
                    self.state.emitted_feed_text = Some(word.value.trim().to_string());
                }
                return Ok(None);
            }
            return Ok(self.restore_feed_move(line, explicit, motion, moves));
        }

        match motion {
            Motion::Linear if !has_xy => {
                let z = z.unwrap_or_default();
                let to_rapid = match self.state.feed_height {
                    None => {
                        tracing::debug!("Feed height estimated at Z{}", z);
                        self.state.feed_height = Some(z);
                        self.state.feed_height_confirmed = false;
                        true
                    }
                    Some(fh) => {
                        let upward = self.state.current_z.is_some_and(|cz| z > cz);
                        upward || z >= fh || !self.state.has_usable_feed()
                    }
                };
                self.state.move_z(Some(z));
                if to_rapid {
                    Ok(Some(self.to_rapid(line)))
                } else {
                    Ok(self.restore_feed_move(line, explicit, motion, true))
                }
            }
            Motion::Linear if z.is_none() => {
                if self.state.at_or_above_feed_height(self.state.current_z) {
                    return Ok(Some(self.to_rapid(line)));
                }
                self.confirm_feed_height();
                Ok(self.restore_feed_move(line, explicit, motion, true))
            }
            Motion::Linear | Motion::ArcCw | Motion::ArcCcw => {
                let end_z = z.or(self.state.current_z);
                if let (Some(end_z), Some(fh)) = (end_z, self.state.feed_height) {
                    if end_z >= fh {
                        let raised = end_z + FEED_HEIGHT_MARGIN;
                        tracing::warn!(
                            "Cutting move at Z{} reaches feed height Z{}; raising estimate to Z{} (review rapid moves)",
                            end_z,
                            fh,
                            raised
                        );
                        self.state.feed_height = Some(raised);
                    }
                }
                if z.is_some() {
                    self.state.move_z(z);
                }
                Ok(self.restore_feed_move(line, explicit, motion, true))
            }
            Motion::Rapid | Motion::Unknown | Motion::Canned => {
                if z.is_some() {
                    self.state.move_z(z);
                }
                Ok(self.restore_feed_move(line, explicit, motion, true))
            }
        }
    }

    /// First cut below the feed height: lower the estimate to where the descent began
    fn confirm_feed_height(&mut self) {
        if self.state.feed_height_confirmed {
            return;
        }
        if let (Some(fh), Some(start)) = (self.state.feed_height, self.state.previous_z) {
            if start < fh {
                tracing::debug!("Feed height lowered from Z{} to Z{}", fh, start);
                self.state.feed_height = Some(start);
            }
        }
        if self.state.feed_height.is_some() {
            self.state.feed_height_confirmed = true;
        }
    }

    /// Turn a feed move into a rapid: motion word set to G0, F word removed
    fn to_rapid(&mut self, line: &GcodeLine) -> String {
        let mut segments = line.segments().to_vec();

        let motion_word = segments.iter_mut().find_map(|segment| match segment {
            Segment::Word(word)
                if word.is('G')
                    && word
                        .code()
                        .and_then(|c| Motion::from_code(&c))
                        .is_some() =>
            {
                Some(word)
            }
            _ => None,
        });
        match motion_word {
            Some(word) => word.value = word.value.replacen('1', "0", 1),
            None => insert_front(&mut segments, Word::new('G', "0")),
        }
        remove_word(&mut segments, 'F');

        self.state.output_motion = Motion::Rapid;
        render(&segments)
    }

    /// Keep the output in step with the source: add the motion word and the feed
    /// rate a previous rapid rewrite took away.
    fn restore_feed_move(
        &mut self,
        line: &GcodeLine,
        explicit: Option<Motion>,
        motion: Motion,
        moves: bool,
    ) -> Option<String> {
        let mut segments = line.segments().to_vec();
        let mut changed = false;

        if explicit.is_none() && moves && motion.is_basic() && self.state.output_motion != motion
        {
            if let Some(code) = motion.word() {
                insert_front(&mut segments, Word::new('G', code));
                changed = true;
            }
        }
        if explicit.is_some() || moves {
            self.state.output_motion = motion;
        }

        if let Some(word) = line.word('F') {
            self.state.emitted_feed_text = Some(word.value.trim().to_string());
        } else if moves && motion.is_feed() && self.state.current_feed_text.is_some()
            && self.state.current_feed_text != self.state.emitted_feed_text
        {
            if let Some(text) = self.state.current_feed_text.clone() {
                append_word(&mut segments, Word::new('F', text.clone()));
                self.state.emitted_feed_text = Some(text);
                changed = true;
            }
        }

        changed.then(|| render(&segments))
    }
}

fn insert_front(segments: &mut Vec<Segment>, word: Word) {
    let at = segments
        .iter()
        .position(|s| matches!(s, Segment::Word(_)))
        .unwrap_or(segments.len());
    segments.insert(at, Segment::Text(" ".to_string()));
    segments.insert(at, Segment::Word(word));
}

fn append_word(segments: &mut Vec<Segment>, word: Word) {
    let at = segments
        .iter()
        .rposition(|s| matches!(s, Segment::Word(_)))
        .map_or(segments.len(), |i| i + 1);
    segments.insert(at, Segment::Word(word));
    segments.insert(at, Segment::Text(" ".to_string()));
}

fn remove_word(segments: &mut Vec<Segment>, letter: char) {
    let Some(at) = segments
        .iter()
        .position(|s| matches!(s, Segment::Word(w) if w.is(letter)))
    else {
        return;
    };
    segments.remove(at);

    let is_space = |s: Option<&Segment>| matches!(s, Some(Segment::Text(t)) if t.trim().is_empty());
    let has_word_before = segments[..at]
        .iter()
        .any(|s| matches!(s, Segment::Word(_)));
    if at > 0 && has_word_before && is_space(segments.get(at - 1)) {
        segments.remove(at - 1);
    } else if is_space(segments.get(at)) {
        segments.remove(at);
    }
}
