// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

/// Source position attached to emitted declarations and proof obligations.
/// Lines and columns are 1-based; 0 means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
