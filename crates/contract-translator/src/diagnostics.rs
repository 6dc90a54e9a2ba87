// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Rendering of translation errors against the module source text

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::{self, termcolor::WriteColor};
use program_model::{SourcePos, SourceProgram, TranslationError};
use std::ops::Range;

/// Byte range of the construct at `line`/`col` (1-based), up to the end of its line.
/// Column 0 means the whole line.
fn span(source: &str, line: usize, col: usize) -> Option<Range<usize>> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let content = text.trim_end_matches(['\n', '\r']);
            let offset = col.saturating_sub(1).min(content.len());
            return Some(start + offset..start + content.len().max(offset + 1).min(text.len()));
        }
        start += text.len();
    }
    None
}

fn diagnostic(err: &TranslationError) -> Diagnostic<usize> {
    match err {
        TranslationError::Unsupported { construct, .. } => Diagnostic::error()
            .with_code("unsupported")
            .with_message(format!("unsupported construct: {}", construct)),
        TranslationError::InvalidProgram { code, message, .. } => Diagnostic::error()
            .with_code(code.clone())
            .with_message(message.clone()),
    }
}

fn locate(program: &SourceProgram, pos: &SourcePos) -> Option<(String, String, Range<usize>)> {
    let module = program.modules.iter().find(|m| m.path == pos.path)?;
    let source = module.source.as_ref()?;
    let range = span(source, pos.line, pos.col)?;
    Some((module.path.clone(), source.clone(), range))
}

/// Emit `err` as a source-annotated diagnostic. Returns false, writing nothing,
/// when the offending module carries no source text.
pub fn emit(writer: &mut dyn WriteColor, program: &SourceProgram, err: &TranslationError) -> anyhow::Result<bool> {
    let Some((path, source, range)) = err.pos().and_then(|pos| locate(program, pos)) else {
        return Ok(false);
    };
    let mut files = SimpleFiles::new();
    let file = files.add(path, source);
    let diagnostic = diagnostic(err).with_labels(vec![Label::primary(file, range)]);
    term::emit(writer, &term::Config::default(), &files, &diagnostic)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codespan_reporting::term::termcolor::Buffer;

    #[test]
    fn test_span_covers_rest_of_line() {
        let source = "x = 1\nraise Foo()\n";
        assert_eq!(span(source, 2, 1), Some(6..17));
        assert_eq!(span(source, 2, 7), Some(12..17));
        assert_eq!(span(source, 3, 1), None);
    }

    #[test]
    fn test_emit_without_source_writes_nothing() {
        let program = SourceProgram::from_json(r#"{ "modules": [{ "name": "m", "path": "m.py", "body": [] }] }"#).unwrap();
        let err = TranslationError::unsupported("lambda", Some(SourcePos::new("m.py", 1, 1)));
        let mut buffer = Buffer::no_color();
        assert!(!emit(&mut buffer, &program, &err).unwrap());
        assert!(buffer.into_inner().is_empty());
    }

    #[test]
    fn test_emit_points_at_source() {
        let program = SourceProgram::from_json(
            r#"{ "modules": [{ "name": "m", "path": "m.py", "body": [], "source": "f = lambda: 1\n" }] }"#,
        )
        .unwrap();
        let err = TranslationError::unsupported("lambda", Some(SourcePos::new("m.py", 1, 5)));
        let mut buffer = Buffer::no_color();
        assert!(emit(&mut buffer, &program, &err).unwrap());
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("error[unsupported]"));
        assert!(text.contains("m.py:1:5"));
    }
}
