// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

/// Location of the offending construct
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub path: String,
    pub line: usize,
    pub col: usize,
}

impl SourcePos {
    pub fn new(path: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            path: path.into(),
            line,
            col,
        }
    }
}

impl Display for SourcePos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.col)
    }
}

/// Errors raised while building the model or lowering it.
/// Both kinds abort the whole compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    /// A construct the translator does not model
    #[error("unsupported: {construct}")]
    Unsupported {
        construct: String,
        pos: Option<SourcePos>,
    },

    /// A well-formedness violation of the source program
    #[error("invalid program ({code}): {message}")]
    InvalidProgram {
        code: String,
        message: String,
        pos: Option<SourcePos>,
    },
}

impl TranslationError {
    pub fn unsupported(construct: impl Into<String>, pos: Option<SourcePos>) -> Self {
        TranslationError::Unsupported {
            construct: construct.into(),
            pos,
        }
    }

    pub fn invalid(code: &str, message: impl Into<String>, pos: Option<SourcePos>) -> Self {
        TranslationError::InvalidProgram {
            code: code.to_string(),
            message: message.into(),
            pos,
        }
    }

    pub fn pos(&self) -> Option<&SourcePos> {
        match self {
            TranslationError::Unsupported { pos, .. }
            | TranslationError::InvalidProgram { pos, .. } => pos.as_ref(),
        }
    }

    /// Short machine-readable code
    pub fn code(&self) -> &str {
        match self {
            TranslationError::Unsupported { .. } => "unsupported",
            TranslationError::InvalidProgram { code, .. } => code,
        }
    }

    /// Attach a position if the error does not have one yet
    pub fn or_at(self, at: &SourcePos) -> Self {
        match self {
            TranslationError::Unsupported {
                construct,
                pos: None,
            } => TranslationError::Unsupported {
                construct,
                pos: Some(at.clone()),
            },
            TranslationError::InvalidProgram {
                code,
                message,
                pos: None,
            } => TranslationError::InvalidProgram {
                code,
                message,
                pos: Some(at.clone()),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
