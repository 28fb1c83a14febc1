//! Fragment merging
//!
//! [`FragmentMerger`] holds everything that carries over between the fragments of
//! one setup: the line counter, the rapid-move rewriter, the last tool and the kept
//! header and tail. Body lines go straight to a writer so a long program never has to
//! be held in memory.

use std::io::Write;

use postmerge_core::{FormatError, Result, ToolNumber};
use postmerge_settings::Settings;

use crate::line::GcodeLine;
use crate::rapid::{RapidMoveRewriter, RapidOptions};
use crate::renumber::LineRenumberer;
use crate::splitter::{EndMarkers, Region, SplitState};
use crate::toolchange::ToolChange;

/// Replaces the temporary program name in the first header with the final one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRename {
    temp: String,
    replacement: String,
}

impl ProgramRename {
    /// In numeric mode the final name is left-padded with zeros to the width of the
    /// temporary name.
    pub fn new(temp: impl Into<String>, final_name: &str, numeric: bool) -> Self {
        let temp = temp.into();
        let replacement = if numeric {
            format!("{:0>width$}", final_name, width = temp.len())
        } else {
            final_name.to_string()
        };
        Self { temp, replacement }
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Rename within a program-name line or a plain header comment. Tool comments
    /// and other lines are never touched, and the name must stand alone: `1001`
    /// does not match inside `10010`.
    fn rename(&self, line: &GcodeLine) -> Option<String> {
        if !line.is_program_name() && !(line.is_comment() && !line.is_tool_comment()) {
            return None;
        }
        self.apply(line.payload())
    }

    fn apply(&self, text: &str) -> Option<String> {
        if self.temp.is_empty() {
            return None;
        }
        let at = text
            .match_indices(&self.temp)
            .map(|(at, _)| at)
            .find(|&at| self.is_token(text, at))?;
        let mut renamed = String::with_capacity(text.len() + self.replacement.len());
        renamed.push_str(&text[..at]);
        renamed.push_str(&self.replacement);
        renamed.push_str(&text[at + self.temp.len()..]);
        Some(renamed)
    }

    fn is_token(&self, text: &str, at: usize) -> bool {
        let joins = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let before = text[..at].chars().next_back();
        let after = text[at + self.temp.len()..].chars().next();
        // `O1001`: a program letter may sit right before a numeric name
        let numeric = self.temp.starts_with(|c: char| c.is_ascii_digit());
        let before_ok = match before {
            None => true,
            Some(c) if numeric => !c.is_ascii_digit() && c != '_',
            Some(c) => !joins(c),
        };
        before_ok && !after.is_some_and(joins)
    }
}

/// Merge configuration for one setup
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub markers: EndMarkers,
    pub tool_change: ToolChange,
    pub line_number_start: u32,
    pub line_number_step: u32,
    /// `None` disables rapid rewriting
    pub rapid: Option<RapidOptions>,
    pub rename: Option<ProgramRename>,
}

impl MergeOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            markers: EndMarkers::from_settings(&settings.merge),
            tool_change: ToolChange::parse(
                &settings.merge.tool_change,
                &settings.merge.tool_change_delimiter,
            ),
            line_number_start: settings.merge.line_number_start,
            line_number_step: settings.merge.line_number_step,
            rapid: RapidOptions::from_settings(&settings.rapid),
            rename: None,
        }
    }

    pub fn with_rename(mut self, rename: ProgramRename) -> Self {
        self.rename = Some(rename);
        self
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Header and tail collected while merging; the body has already been written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedProgram {
    pub header: Vec<String>,
    pub tail: Vec<String>,
}

/// Line counts for one merged setup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub fragments: usize,
    pub body_lines: usize,
    pub rewritten_lines: usize,
    pub tool_changes: usize,
}

/// Merges the fragments of one setup, in order
#[derive(Debug)]
pub struct FragmentMerger {
    options: MergeOptions,
    numbers: LineRenumberer,
    rewriter: Option<RapidMoveRewriter>,
    last_tool: Option<ToolNumber>,
    program: MergedProgram,
    stats: MergeStats,
}

impl FragmentMerger {
    pub fn new(options: MergeOptions) -> Self {
        let numbers = LineRenumberer::new(options.line_number_start, options.line_number_step);
        let rewriter = options.rapid.clone().map(RapidMoveRewriter::new);
        Self {
            options,
            numbers,
            rewriter,
            last_tool: None,
            program: MergedProgram::default(),
            stats: MergeStats::default(),
        }
    }

    fn is_first_fragment(&self) -> bool {
        self.stats.fragments == 0
    }

    /// Merge one fragment, writing its body lines to `body`.
    ///
    /// `operations` names the fragment's operations in error messages. The tail is
    /// kept only when `is_last` is set.
    pub fn merge_fragment<W: Write>(
        &mut self,
        text: &str,
        is_last: bool,
        operations: &str,
        body: &mut W,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Err(FormatError::Empty {
                operations: operations.to_string(),
            }
            .into());
        }

        let first = self.is_first_fragment();
        let mut state = SplitState::default();
        let mut tool_seen = false;
        let mut header = Vec::new();
        let mut tail = Vec::new();

        for raw in text.lines() {
            let line = GcodeLine::parse(raw);
            let (next, region) = state.step(&line, &self.options.markers);
            state = next;

            match region {
                Region::ProgramMarker | Region::Header if !first => {
                    if line.is_tool_comment() {
                        tracing::trace!("Dropping repeated tool comment: {}", line.raw());
                    }
                }
                Region::ProgramMarker => header.push(line.raw().to_string()),
                Region::Header => {
                    let renamed = self.options.rename.as_ref().and_then(|r| r.rename(&line));
                    let payload = renamed.as_deref().unwrap_or(line.payload());
                    header.push(self.numbers.apply(&line, payload));
                }
                Region::ToolSelect => {
                    tool_seen = true;
                    let tool = line.tool_number;
                    if !first && tool == self.last_tool {
                        tracing::debug!("Dropping repeated selection of tool {:?}", tool);
                    } else {
                        if !first {
                            self.stats.tool_changes += 1;
                            for snippet_line in self.options.tool_change.emit(&mut self.numbers) {
                                writeln!(body, "{}", snippet_line)?;
                                self.stats.body_lines += 1;
                            }
                        }
                        let out = self.emit(&line);
                        writeln!(body, "{}", out)?;
                        self.stats.body_lines += 1;
                    }
                    self.last_tool = tool;
                }
                Region::Body => {
                    let out = self.emit(&line);
                    writeln!(body, "{}", out)?;
                    self.stats.body_lines += 1;
                }
                Region::Tail if is_last => {
                    let out = self.emit(&line);
                    tail.push(out);
                }
                Region::Tail => {}
            }
        }

        if !tool_seen {
            return Err(FormatError::MissingToolLine {
                operations: operations.to_string(),
            }
            .into());
        }

        if first {
            self.program.header = header;
        }
        if is_last {
            self.program.tail = tail;
        }
        self.stats.fragments += 1;
        tracing::debug!(
            "Merged fragment for {} ({} body lines so far)",
            operations,
            self.stats.body_lines
        );
        Ok(())
    }

    /// Renumber a line, rewriting it first when rapid rewriting is active
    fn emit(&mut self, line: &GcodeLine) -> String {
        let mut rewritten = None;
        if let Some(rewriter) = self.rewriter.as_mut() {
            match rewriter.rewrite(line) {
                Ok(payload) => rewritten = payload,
                Err(e) => {
                    tracing::warn!(
                        "Rapid rewriting disabled for the rest of this setup at '{}': {}",
                        line.raw(),
                        e
                    );
                    self.rewriter = None;
                }
            }
        }
        if rewritten.is_some() {
            self.stats.rewritten_lines += 1;
        }
        let payload = rewritten.as_deref().unwrap_or(line.payload());
        self.numbers.apply(line, payload)
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Whether rapid rewriting is still active
    pub fn is_rewriting(&self) -> bool {
        self.rewriter.is_some()
    }

    /// The kept header and tail
    pub fn finish(self) -> MergedProgram {
        self.program
    }
}

/// Merge complete fragments in memory.
///
/// Operation names in errors are `fragment 1`, `fragment 2`, ...
pub fn merge_fragments<S: AsRef<str>>(fragments: &[S], options: MergeOptions) -> Result<String> {
    let mut merger = FragmentMerger::new(options);
    let mut body = Vec::new();
    let count = fragments.len();
    for (i, fragment) in fragments.iter().enumerate() {
        let name = format!("fragment {}", i + 1);
        merger.merge_fragment(fragment.as_ref(), i + 1 == count, &name, &mut body)?;
    }
    let program = merger.finish();

    let mut out = String::new();
    for line in &program.header {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&String::from_utf8_lossy(&body));
    for line in &program.tail {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: &str = "%\nO1001 (postmerge_tmp)\n(T1 D=6)\nN10 G90 G21\nN15 T1 M6\nN20 S1000 M3\nN25 G0 X0 Y0\nN30 M5\nN35 M30\n%";
    const SECOND: &str = "%\nO1001 (postmerge_tmp)\n(T2 D=3)\nN10 G90 G21\nN15 T2 M6\nN20 S2000 M3\nN25 G0 X1 Y1\nN30 M5\nN35 M30\n%";

    #[test]
    fn test_two_tools() {
        let out = merge_fragments(&[FIRST, SECOND], MergeOptions::default()).unwrap();
        let expected = "%\nO1001 (postmerge_tmp)\n(T1 D=6)\nN10 G90 G21\nN15 T1 M6\nN20 S1000 M3\nN25 G0 X0 Y0\nN30 T2 M6\nN35 S2000 M3\nN40 G0 X1 Y1\nN45 M5\nN50 M30\n%\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_same_tool_drops_tool_line() {
        let second = SECOND.replace("T2", "T1");
        let out = merge_fragments(&[FIRST, second.as_str()], MergeOptions::default()).unwrap();
        assert_eq!(out.matches("T1 M6").count(), 1);
        assert!(out.contains("N30 S2000 M3"));
    }

    #[test]
    fn test_tool_change_snippet() {
        let mut options = MergeOptions::default();
        options.tool_change = ToolChange::parse("N M9|G30 Z0", "|");
        let out = merge_fragments(&[FIRST, SECOND], options).unwrap();
        assert!(out.contains("N25 G0 X0 Y0\nN30 M9\nG30 Z0\nN35 T2 M6\n"));
    }

    #[test]
    fn test_program_rename() {
        let options =
            MergeOptions::default().with_rename(ProgramRename::new("postmerge_tmp", "Bracket", false));
        let out = merge_fragments(&[FIRST, SECOND], options).unwrap();
        assert!(out.contains("O1001 (Bracket)"));
        assert!(!out.contains("postmerge_tmp"));
    }

    #[test]
    fn test_numeric_rename_pads() {
        let rename = ProgramRename::new("99999", "42", true);
        assert_eq!(rename.replacement(), "00042");
        assert_eq!(rename.apply("O99999").as_deref(), Some("O00042"));
        assert_eq!(rename.apply("(PART 999990)"), None);
    }

    #[test]
    fn test_rename_skips_tool_comments_and_longer_numbers() {
        let fragment = "%\nO1001 (1001)\n(T1 D=1001.)\n(FIXTURE 10010)\nN10 G90\nN15 T1 M6\nN20 G0 X0\nN25 M30\n%";
        let options = MergeOptions::default().with_rename(ProgramRename::new("1001", "42", true));
        let out = merge_fragments(&[fragment], options).unwrap();
        assert!(out.starts_with("%\nO0042 (1001)\n(T1 D=1001.)\n(FIXTURE 10010)\n"));
    }

    #[test]
    fn test_missing_tool_line() {
        let err = merge_fragments(&["G0 X0\nM30"], MergeOptions::default()).unwrap_err();
        assert!(err.is_format_error());
        assert!(err.to_string().contains("fragment 1"));
    }

    #[test]
    fn test_empty_fragment() {
        let err = merge_fragments(&["  \n"], MergeOptions::default()).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_heuristic_error_disables_rewriter() {
        let mut settings = Settings::default();
        settings.rapid.enabled = true;
        let mut merger = FragmentMerger::new(MergeOptions::from_settings(&settings));
        let mut body = Vec::new();
        merger
            .merge_fragment("T1\nG1 Z#1 F10\nG1 Z5 F10\nM30", true, "Op", &mut body)
            .unwrap();
        assert!(!merger.is_rewriting());
        assert_eq!(String::from_utf8(body).unwrap(), "T1\nG1 Z#1 F10\nG1 Z5 F10\n");
    }

    #[test]
    fn test_stats() {
        let mut merger = FragmentMerger::new(MergeOptions::default());
        let mut body = Vec::new();
        merger.merge_fragment(FIRST, false, "A", &mut body).unwrap();
        merger.merge_fragment(SECOND, true, "B", &mut body).unwrap();
        let stats = merger.stats();
        assert_eq!(stats.fragments, 2);
        assert_eq!(stats.tool_changes, 1);
        assert_eq!(stats.body_lines, 6);
        let program = merger.finish();
        assert_eq!(program.tail, vec!["N45 M5", "N50 M30", "%"]);
    }
}
