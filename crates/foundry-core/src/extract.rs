//! Code extraction from model output
//!
//! The first fenced code block is the code; everything around it is the
//! explanation.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

/// Model output split into code and prose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    /// Body of the first fenced block, if any
    pub code: Option<String>,
    /// Fence info string (`python`, `rust`, ...)
    pub language: Option<String>,
    /// Text with that block removed, trimmed
    pub explanation: String,
}

impl Extracted {
    /// Was a fenced block found?
    #[inline]
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

/// Split `text` at its first fenced code block
///
/// Indented blocks are ignored. An unclosed fence runs to the end of the text.
#[must_use]
pub fn extract(text: &str) -> Extracted {
    let mut code = String::new();
    let mut language = None;
    let mut span = None;
    let mut in_block = false;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if span.is_none() => {
                in_block = true;
                language = info
                    .split_whitespace()
                    .next()
                    .filter(|l| !l.is_empty())
                    .map(str::to_string);
                span = Some(range);
            }
            Event::Text(body) if in_block => code.push_str(&body),
            Event::End(TagEnd::CodeBlock) if in_block => break,
            _ => {}
        }
    }

    let Some(span) = span else {
        return Extracted {
            code: None,
            language: None,
            explanation: text.trim().to_string(),
        };
    };

    let mut explanation = String::with_capacity(text.len());
    explanation.push_str(text[..span.start].trim_end());
    let rest = text[span.end..].trim_start();
    if !explanation.is_empty() && !rest.is_empty() {
        explanation.push_str("\n\n");
    }
    explanation.push_str(rest);

    Extracted {
        code: Some(code.trim_start_matches('\n').trim_end().to_string()),
        language,
        explanation: explanation.trim().to_string(),
    }
}
