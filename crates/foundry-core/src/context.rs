//! Request context assembly
//!
//! Builds the text that precedes the user prompt: either a bounded
//! project-wide summary or the single target file, plus attachments.

use crate::config::ContextConfig;
use crate::model::ContentPart;
use crate::types::{Attachment, AttachmentKind};
use foundry_sandbox::FileStore;
use std::fmt::Write as _;

/// Bounded project summary: file tree plus truncated key files
pub async fn project_context(files: &FileStore, config: &ContextConfig) -> String {
    let tree = files.list_files(config.tree_depth);
    let mut out = String::from("PROJECT STRUCTURE:\n");
    for entry in tree.iter().take(config.max_tree_entries) {
        let _ = writeln!(out, "  {entry}");
    }
    if tree.len() > config.max_tree_entries {
        let _ = writeln!(out, "  ... ({} more)", tree.len() - config.max_tree_entries);
    }
    if tree.is_empty() {
        out.push_str("  (empty)\n");
    }

    for name in &config.key_files {
        let Ok(content) = files.read(name).await else {
            continue;
        };
        let _ = write!(
            out,
            "\nKEY FILE {name}:\n{}\n",
            truncate_chars(&content, config.max_file_chars)
        );
    }

    tracing::debug!(entries = tree.len(), bytes = out.len(), "project context built");
    out
}

/// Context naming one target file, with its content when readable
pub async fn target_context(files: &FileStore, target: &str) -> String {
    let mut out = format!("Target file: {target}\n");
    match files.read(target).await {
        Ok(content) => {
            let _ = write!(out, "\nCURRENT CONTENT:\n```\n{content}\n```\n");
        }
        Err(e) => tracing::debug!(target, "target not readable: {}", e),
    }
    out
}

/// Merge context, prompt, and attachments into message parts
///
/// File attachments become delimited text sections; images become image parts.
#[must_use]
pub fn build_content(context: &str, prompt: &str, attachments: &[Attachment]) -> Vec<ContentPart> {
    let mut text = String::new();
    if !context.is_empty() {
        text.push_str(context.trim_end());
        text.push_str("\n\n");
    }
    let _ = write!(text, "USER REQUEST:\n{prompt}");

    let mut images = Vec::new();
    for attachment in attachments {
        match attachment.kind {
            AttachmentKind::File => {
                let _ = write!(
                    text,
                    "\n\n--- ATTACHMENT: {name} ---\n{data}\n--- END OF {name} ---",
                    name = attachment.name,
                    data = attachment.data
                );
            }
            AttachmentKind::Image => images.push(ContentPart::image(&attachment.data)),
        }
    }

    let mut parts = Vec::with_capacity(1 + images.len());
    parts.push(ContentPart::text(text));
    parts.extend(images);
    parts
}

/// First `max` characters, with a marker when cut
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\n... (truncated)", &text[..idx]),
        None => text.to_string(),
    }
}
