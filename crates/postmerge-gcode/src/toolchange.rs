//! Tool-change snippet
//!
//! User G-code inserted between two fragments when the tool changes. Lines are
//! separated by a delimiter; a leading `N` that is not followed by a digit asks for
//! the first line to be numbered from the program's line counter.

use crate::renumber::LineRenumberer;

/// Parsed tool-change snippet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolChange {
    lines: Vec<String>,
    numbered: bool,
}

impl ToolChange {
    /// Parse `snippet`, splitting lines on `delimiter`
    pub fn parse(snippet: &str, delimiter: &str) -> Self {
        let trimmed = snippet.trim();
        let mut chars = trimmed.chars();
        let numbered = matches!(chars.next(), Some('N' | 'n'))
            && !chars.next().is_some_and(|c| c.is_ascii_digit());
        let body = if numbered { &trimmed[1..] } else { trimmed };

        let lines = if delimiter.is_empty() {
            vec![body.trim().to_string()]
        } else {
            body.split(delimiter).map(|l| l.trim().to_string()).collect()
        };

        Self {
            lines: lines.into_iter().filter(|l| !l.is_empty()).collect(),
            numbered,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether the first line gets a line number
    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Lines to insert, numbering the first from `numbers` when requested
    pub fn emit(&self, numbers: &mut LineRenumberer) -> Vec<String> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 && self.numbered {
                    numbers.number(line)
                } else {
                    line.clone()
                }
            })
            .collect()
    }
}
