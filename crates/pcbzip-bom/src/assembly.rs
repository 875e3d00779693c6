//! Part number assignment, one BOM line at a time
//!
//! Every assignment rewrites the whole BOM file before the cursor moves on,
//! so an aborted session can be picked up again from what is on disk.

use std::path::PathBuf;

use crate::error::{BomError, Result};
use crate::line::BomLine;
use crate::normalize::{self, BomShape};

/// Where the cursor starts when a session is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumePolicy {
    /// First line without a part number, or the first line if all are assigned
    #[default]
    FirstUnassigned,
    /// Always the first line
    Restart,
}

#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub bom_path: PathBuf,
    pub resume: ResumePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Viewing(usize),
    Done,
    Aborted,
}

impl AssemblyState {
    pub fn is_finished(self) -> bool {
        !matches!(self, AssemblyState::Viewing(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    First,
    Last,
    Next,
    Previous,
    Abort,
}

#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub code: &'static str,
    pub action: Action,
    pub help: &'static str,
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        code: "F",
        action: Action::First,
        help: "First line",
    },
    ActionSpec {
        code: "L",
        action: Action::Last,
        help: "Last line",
    },
    ActionSpec {
        code: "N",
        action: Action::Next,
        help: "Next line",
    },
    ActionSpec {
        code: "B",
        action: Action::Previous,
        help: "Back to the previous line",
    },
    ActionSpec {
        code: "A",
        action: Action::Abort,
        help: "Abort, assignments made so far are kept",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyCommand {
    Assign(String),
    /// Mark the line as not fitted
    Clear,
    Navigate(Action),
}

impl AssemblyCommand {
    /// Interpret one line of user input.
    ///
    /// Action codes are matched case-insensitively, empty input clears the
    /// part number and anything else is taken as a part number.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return AssemblyCommand::Clear;
        }
        match ACTIONS.iter().find(|a| a.code.eq_ignore_ascii_case(input)) {
            Some(spec) => AssemblyCommand::Navigate(spec.action),
            None => AssemblyCommand::Assign(input.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct AssemblySession {
    config: AssemblyConfig,
    lines: Vec<BomLine>,
    state: AssemblyState,
}

impl AssemblySession {
    /// Load a BOM already in canonical form and position the cursor per the
    /// resume policy. Every assignment rewrites the file, so a BOM that would
    /// change when rendered is refused.
    pub fn open(config: AssemblyConfig) -> Result<Self> {
        let bom = normalize::read_bom(&config.bom_path)?;
        if bom.shape != BomShape::Canonical {
            return Err(BomError::UnsupportedBomFormat {
                header: bom.header,
                required: normalize::CANONICAL_HEADER.join(","),
            });
        }
        if bom.needs_rewrite {
            return Err(BomError::NotNormalized {
                path: config.bom_path,
            });
        }
        Ok(Self::from_lines(config, bom.lines))
    }

    pub fn from_lines(config: AssemblyConfig, lines: Vec<BomLine>) -> Self {
        let state = if lines.is_empty() {
            AssemblyState::Done
        } else {
            let start = match config.resume {
                ResumePolicy::Restart => 0,
                ResumePolicy::FirstUnassigned => {
                    lines.iter().position(|l| !l.is_assigned()).unwrap_or(0)
                }
            };
            AssemblyState::Viewing(start)
        };
        log::debug!(
            "Assembly session on {} with {} lines, starting at {state:?}",
            config.bom_path.display(),
            lines.len()
        );
        Self {
            config,
            lines,
            state,
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// The line under the cursor, if still viewing
    pub fn current(&self) -> Option<(usize, &BomLine)> {
        match self.state {
            AssemblyState::Viewing(i) => self.lines.get(i).map(|line| (i, line)),
            _ => None,
        }
    }

    pub fn apply(&mut self, command: AssemblyCommand) -> Result<AssemblyState> {
        let AssemblyState::Viewing(i) = self.state else {
            return Err(BomError::SessionFinished);
        };
        let last = self.lines.len() - 1;

        self.state = match command {
            AssemblyCommand::Assign(part_number) => {
                self.set_part_number(i, part_number)?;
                self.advance(i)
            }
            AssemblyCommand::Clear => {
                self.set_part_number(i, String::new())?;
                self.advance(i)
            }
            AssemblyCommand::Navigate(Action::First) => AssemblyState::Viewing(0),
            AssemblyCommand::Navigate(Action::Last) => AssemblyState::Viewing(last),
            AssemblyCommand::Navigate(Action::Next) => AssemblyState::Viewing((i + 1).min(last)),
            AssemblyCommand::Navigate(Action::Previous) => {
                AssemblyState::Viewing(i.saturating_sub(1))
            }
            AssemblyCommand::Navigate(Action::Abort) => AssemblyState::Aborted,
        };
        Ok(self.state)
    }

    /// Update line `i` and persist the whole BOM; the line is unchanged if saving fails
    fn set_part_number(&mut self, i: usize, part_number: String) -> Result<()> {
        let previous = std::mem::replace(&mut self.lines[i].part_number, part_number);
        if let Err(e) = normalize::write_bom(&self.config.bom_path, &self.lines) {
            self.lines[i].part_number = previous;
            return Err(e);
        }
        Ok(())
    }

    fn advance(&self, i: usize) -> AssemblyState {
        if i + 1 < self.lines.len() {
            AssemblyState::Viewing(i + 1)
        } else {
            AssemblyState::Done
        }
    }
}
