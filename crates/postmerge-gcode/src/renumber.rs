//! Line renumbering
//!
//! One counter runs across the whole merged program. Lines that carried an `N`
//! number in their fragment get the next value; unnumbered lines stay unnumbered.

use crate::line::GcodeLine;

/// Monotonic line-number counter for one merged program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRenumberer {
    next: u32,
    step: u32,
}

impl LineRenumberer {
    /// Counter starting at `start`, advancing by `step` (at least 1)
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            next: start,
            step: step.max(1),
        }
    }

    /// The number the next numbered line will get
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Consume one number
    pub fn take(&mut self) -> u32 {
        let n = self.next;
        self.next = self.next.saturating_add(self.step);
        n
    }

    /// Prefix `payload` with the next number
    pub fn number(&mut self, payload: &str) -> String {
        let n = self.take();
        let payload = payload.trim_start();
        if payload.is_empty() {
            format!("N{n}")
        } else {
            format!("N{n} {payload}")
        }
    }

    /// Output text for `line` with `payload` as its content: renumbered if the
    /// line was numbered, otherwise the payload unchanged.
    pub fn apply(&mut self, line: &GcodeLine, payload: &str) -> String {
        if line.line_number.is_some() {
            self.number(payload)
        } else {
            payload.to_string()
        }
    }
}

impl Default for LineRenumberer {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_by_step() {
        let mut numbers = LineRenumberer::new(10, 5);
        assert_eq!(numbers.take(), 10);
        assert_eq!(numbers.take(), 15);
        assert_eq!(numbers.peek(), 20);
    }

    #[test]
    fn test_only_numbered_lines_consume() {
        let mut numbers = LineRenumberer::new(100, 10);
        let numbered = GcodeLine::parse("N7 G0 X0");
        let plain = GcodeLine::parse("(comment)");
        assert_eq!(numbers.apply(&plain, plain.payload()), "(comment)");
        assert_eq!(numbers.apply(&numbered, numbered.payload()), "N100 G0 X0");
        assert_eq!(numbers.peek(), 110);
    }

    #[test]
    fn test_bare_number() {
        let mut numbers = LineRenumberer::new(1, 1);
        let line = GcodeLine::parse("N45");
        assert_eq!(numbers.apply(&line, line.payload()), "N1");
    }

    #[test]
    fn test_zero_step_clamped() {
        let mut numbers = LineRenumberer::new(1, 0);
        numbers.take();
        assert_eq!(numbers.peek(), 2);
    }
}
