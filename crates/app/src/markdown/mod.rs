//! Assistant message rendering: markdown parsing, code highlighting and the
//! gpui element tree built from both.

pub mod copy;
pub mod highlighter;
pub mod parser;
pub mod render;

pub use copy::{COPIED_FEEDBACK, CopyFeedback};
pub use render::{CodeActions, render_markdown};

use highlighter::HighlightedLine;
use parser::MarkdownDocument;

/// Parsed markdown with its code blocks already highlighted for one palette.
#[derive(Debug, Clone)]
pub struct PreparedMarkdown {
    document: MarkdownDocument,
    highlighted: Vec<Vec<HighlightedLine>>,
    dark: bool,
}

impl PreparedMarkdown {
    pub fn new(text: &str, dark: bool) -> Self {
        let document = parser::parse(text);
        let highlighted = document
            .code_blocks()
            .into_iter()
            .map(|code| highlighter::highlight(&code.code, code.language.as_deref(), dark))
            .collect();

        Self {
            document,
            highlighted,
            dark,
        }
    }

    pub fn document(&self) -> &MarkdownDocument {
        &self.document
    }

    pub fn is_dark(&self) -> bool {
        self.dark
    }

    /// Highlighted lines of the `index`-th code block in reading order.
    pub fn highlighted(&self, index: usize) -> Option<&[HighlightedLine]> {
        self.highlighted.get(index).map(Vec::as_slice)
    }

    /// Clipboard text of the `index`-th code block.
    pub fn code_text(&self, index: usize) -> Option<String> {
        self.document
            .code_blocks()
            .get(index)
            .map(|code| code.copy_text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_blocks_are_indexed_in_reading_order() {
        let markdown = PreparedMarkdown::new(
            "```rust\nlet a = 1;\n```\n\n- item\n\n  ```\n  ls\n  ```\n",
            true,
        );

        assert_eq!(markdown.code_text(0).as_deref(), Some("let a = 1;"));
        assert_eq!(markdown.code_text(1).as_deref(), Some("ls"));
        assert_eq!(markdown.code_text(2), None);
        assert_eq!(markdown.highlighted(1).map(<[_]>::len), Some(1));
        assert!(markdown.is_dark());
    }
}
