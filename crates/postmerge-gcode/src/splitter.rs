//! Fragment splitting
//!
//! Every fragment is read as header, tool selection, body and tail. The state
//! machine below assigns each line to one of those regions; the merger decides
//! what to keep.

use crate::line::{CodeSet, GcodeLine};
use postmerge_settings::MergeSettings;

/// Codes that mark the end of a fragment's cutting body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndMarkers {
    m_codes: CodeSet,
    g_codes: CodeSet,
}

impl EndMarkers {
    pub fn new(m_codes: CodeSet, g_codes: CodeSet) -> Self {
        Self { m_codes, g_codes }
    }

    /// Markers from merge settings; home codes count only when `home_ends_body` is set
    pub fn from_settings(settings: &MergeSettings) -> Self {
        let mut g_codes = CodeSet::from_strings(&settings.end_g_codes);
        if settings.home_ends_body {
            g_codes.extend(&CodeSet::from_strings(&settings.home_g_codes));
        }
        Self {
            m_codes: CodeSet::from_strings(&settings.end_m_codes),
            g_codes,
        }
    }

    /// Whether `line` begins the tail
    pub fn ends_body(&self, line: &GcodeLine) -> bool {
        line.has_m_code_in(&self.m_codes) || line.has_g_code_in(&self.g_codes)
    }
}

/// Where the splitter is within a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitState {
    /// Nothing read yet
    #[default]
    ProgramStart,
    /// Before the first tool selection
    Header,
    /// After the tool selection, before an end marker
    Body,
    /// At or after the first end marker
    TailFound,
}

/// Region a single line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Leading `%`
    ProgramMarker,
    Header,
    /// The first `T` line
    ToolSelect,
    Body,
    Tail,
}

impl SplitState {
    /// Classify `line` and move to the next state
    pub fn step(self, line: &GcodeLine, markers: &EndMarkers) -> (SplitState, Region) {
        match self {
            SplitState::ProgramStart if line.is_program_marker() => {
                (SplitState::Header, Region::ProgramMarker)
            }
            SplitState::ProgramStart | SplitState::Header => {
                if line.tool_number.is_some() {
                    (SplitState::Body, Region::ToolSelect)
                } else {
                    (SplitState::Header, Region::Header)
                }
            }
            SplitState::Body if markers.ends_body(line) => (SplitState::TailFound, Region::Tail),
            SplitState::Body => (SplitState::Body, Region::Body),
            SplitState::TailFound => (SplitState::TailFound, Region::Tail),
        }
    }
}

/// Split a whole fragment into regions, for inspection and tests
pub fn split_fragment(text: &str, markers: &EndMarkers) -> Vec<(Region, GcodeLine)> {
    let mut state = SplitState::default();
    text.lines()
        .map(|raw| {
            let line = GcodeLine::parse(raw);
            let (next, region) = state.step(&line, markers);
            state = next;
            (region, line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> EndMarkers {
        EndMarkers::from_settings(&MergeSettings::default())
    }

    fn regions(text: &str, markers: &EndMarkers) -> Vec<Region> {
        split_fragment(text, markers)
            .into_iter()
            .map(|(region, _)| region)
            .collect()
    }

    #[test]
    fn test_regions() {
        let text = "%\nO1001\nN10 G90 G21\nN15 T1 M6\nN20 G0 X0\nN25 M5\nN30 M30\n%";
        assert_eq!(
            regions(text, &markers()),
            vec![
                Region::ProgramMarker,
                Region::Header,
                Region::Header,
                Region::ToolSelect,
                Region::Body,
                Region::Tail,
                Region::Tail,
                Region::Tail,
            ]
        );
    }

    #[test]
    fn test_second_tool_line_is_body() {
        let text = "T1 M6\nG0 X0\nT2 M6\nG0 X1";
        assert_eq!(
            regions(text, &markers()),
            vec![Region::ToolSelect, Region::Body, Region::Body, Region::Body]
        );
    }

    #[test]
    fn test_end_marker_before_tool_is_header() {
        let text = "M5\nT3";
        assert_eq!(
            regions(text, &markers()),
            vec![Region::Header, Region::ToolSelect]
        );
    }

    #[test]
    fn test_home_ends_body_only_when_enabled() {
        let text = "T1\nG28 Z0\nG0 X0";
        assert_eq!(
            regions(text, &markers()),
            vec![Region::ToolSelect, Region::Body, Region::Body]
        );

        let mut settings = MergeSettings::default();
        settings.home_ends_body = true;
        let markers = EndMarkers::from_settings(&settings);
        assert_eq!(
            regions(text, &markers),
            vec![Region::ToolSelect, Region::Tail, Region::Tail]
        );
    }

    #[test]
    fn test_percent_only_at_start() {
        let text = "(x)\n%\nT1";
        assert_eq!(
            regions(text, &markers()),
            vec![Region::Header, Region::Header, Region::ToolSelect]
        );
    }
}
