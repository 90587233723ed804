use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Header label used when a code block names no language, or names `text`.
pub const FALLBACK_CODE_LABEL: &str = "Terminal";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: InlineStyle,
}

pub type Inline = Vec<Span>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn header_label(&self) -> &str {
        match self.language.as_deref() {
            Some(language) if !language.eq_ignore_ascii_case("text") => language,
            _ => FALLBACK_CODE_LABEL,
        }
    }

    /// Text placed on the clipboard: the code without its trailing newline.
    pub fn copy_text(&self) -> &str {
        self.code.strip_suffix('\n').unwrap_or(&self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAlignment {
    None,
    Left,
    Center,
    Right,
}

impl From<Alignment> for CellAlignment {
    fn from(alignment: Alignment) -> Self {
        match alignment {
            Alignment::None => Self::None,
            Alignment::Left => Self::Left,
            Alignment::Center => Self::Center,
            Alignment::Right => Self::Right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub alignments: Vec<CellAlignment>,
    pub header: Vec<Inline>,
    pub rows: Vec<Vec<Inline>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        content: Inline,
    },
    Paragraph(Inline),
    Code(CodeBlock),
    List {
        ordered: bool,
        start: u64,
        items: Vec<Vec<Block>>,
    },
    Quote(Vec<Block>),
    Table(Table),
    Rule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub blocks: Vec<Block>,
}

impl MarkdownDocument {
    /// Code blocks in reading order, including nested ones.
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut found = Vec::new();
        collect_code(&self.blocks, &mut found);
        found
    }
}

fn collect_code<'a>(blocks: &'a [Block], found: &mut Vec<&'a CodeBlock>) {
    for block in blocks {
        match block {
            Block::Code(code) => found.push(code),
            Block::List { items, .. } => {
                for item in items {
                    collect_code(item, found);
                }
            }
            Block::Quote(inner) => collect_code(inner, found),
            Block::Heading { .. } | Block::Paragraph(_) | Block::Table(_) | Block::Rule => {}
        }
    }
}

/// Returns the link target if it may be handed to the system browser.
pub fn openable_link(url: &str) -> Option<&str> {
    let url = url.trim();
    let (scheme, _) = url.split_once(':')?;
    let allowed = ["http", "https", "mailto"]
        .iter()
        .any(|allowed| scheme.eq_ignore_ascii_case(allowed));
    allowed.then_some(url)
}

/// Extracts the language token from a fenced block's info string.
fn code_language(info: &str) -> Option<String> {
    let token = info
        .split_whitespace()
        .next()?
        .trim_start_matches("language-");
    let language = token
        .chars()
        .take_while(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '+' | '#' | '-'))
        .collect::<String>();
    (!language.is_empty()).then_some(language)
}

pub fn parse(markdown: &str) -> MarkdownDocument {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut builder = DocumentBuilder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.process(event);
    }
    builder.finish()
}

enum Container {
    Quote(Vec<Block>),
    List {
        ordered: bool,
        start: u64,
        items: Vec<Vec<Block>>,
        current: Vec<Block>,
    },
}

#[derive(Default)]
struct TableBuilder {
    alignments: Vec<CellAlignment>,
    header: Vec<Inline>,
    rows: Vec<Vec<Inline>>,
    row: Vec<Inline>,
}

#[derive(Default)]
struct DocumentBuilder {
    blocks: Vec<Block>,
    containers: Vec<Container>,
    spans: Inline,
    styles: Vec<InlineStyle>,
    heading: Option<u8>,
    code: Option<CodeBlock>,
    table: Option<TableBuilder>,
}

impl DocumentBuilder {
    fn process(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let mut style = self.style();
                style.code = true;
                self.push_span(&code, style);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.text("\n"),
            Event::Rule => {
                self.flush_paragraph();
                self.add_block(Block::Rule);
            }
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_paragraph();
                self.heading = Some(heading_level(level));
            }
            Tag::CodeBlock(kind) => {
                self.flush_paragraph();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => code_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_paragraph();
                self.containers.push(Container::List {
                    ordered: start.is_some(),
                    start: start.unwrap_or(1),
                    items: Vec::new(),
                    current: Vec::new(),
                });
            }
            Tag::BlockQuote(_) => {
                self.flush_paragraph();
                self.containers.push(Container::Quote(Vec::new()));
            }
            Tag::Table(alignments) => {
                self.flush_paragraph();
                self.table = Some(TableBuilder {
                    alignments: alignments.into_iter().map(CellAlignment::from).collect(),
                    ..Default::default()
                });
            }
            Tag::TableCell => self.spans.clear(),
            Tag::Emphasis => self.push_style(|style| style.italic = true),
            Tag::Strong => self.push_style(|style| style.bold = true),
            Tag::Strikethrough => self.push_style(|style| style.strikethrough = true),
            Tag::Link { dest_url, .. } => {
                let target = dest_url.to_string();
                self.push_style(move |style| style.link = Some(target));
            }
            Tag::Image { .. } => self.push_style(|style| style.italic = true),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                let level = self.heading.take().unwrap_or(1);
                let content = std::mem::take(&mut self.spans);
                if !content.is_empty() {
                    self.add_block(Block::Heading { level, content });
                }
            }
            TagEnd::Paragraph => self.flush_paragraph(),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.add_block(Block::Code(code));
                }
            }
            TagEnd::Item => {
                self.flush_paragraph();
                if let Some(Container::List { items, current, .. }) = self.containers.last_mut() {
                    items.push(std::mem::take(current));
                }
            }
            TagEnd::List(_) => {
                if let Some(Container::List {
                    ordered,
                    start,
                    items,
                    ..
                }) = self.containers.pop()
                {
                    self.add_block(Block::List {
                        ordered,
                        start,
                        items,
                    });
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_paragraph();
                if let Some(Container::Quote(blocks)) = self.containers.pop() {
                    self.add_block(Block::Quote(blocks));
                }
            }
            TagEnd::TableCell => {
                let cell = std::mem::take(&mut self.spans);
                if let Some(table) = self.table.as_mut() {
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.add_block(Block::Table(Table {
                        alignments: table.alignments,
                        header: table.header,
                        rows: table.rows,
                    }));
                }
            }
            TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Link
            | TagEnd::Image => {
                self.styles.pop();
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.code.push_str(text);
            return;
        }
        let style = self.style();
        self.push_span(text, style);
    }

    fn style(&self) -> InlineStyle {
        self.styles.last().cloned().unwrap_or_default()
    }

    fn push_style(&mut self, modify: impl FnOnce(&mut InlineStyle)) {
        let mut style = self.style();
        modify(&mut style);
        self.styles.push(style);
    }

    fn push_span(&mut self, text: &str, style: InlineStyle) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span {
                text: text.to_string(),
                style,
            }),
        }
    }

    fn flush_paragraph(&mut self) {
        // Cell text is collected by the table, not turned into paragraphs.
        if self.table.is_some() || self.spans.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.spans);
        self.add_block(Block::Paragraph(content));
    }

    fn add_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::List { current, .. }) => current.push(block),
            Some(Container::Quote(blocks)) => blocks.push(block),
            None => self.blocks.push(block),
        }
    }

    fn finish(mut self) -> MarkdownDocument {
        self.flush_paragraph();
        // Unterminated containers only happen on truncated input; keep their content.
        while let Some(container) = self.containers.pop() {
            let block = match container {
                Container::Quote(blocks) => Block::Quote(blocks),
                Container::List {
                    ordered,
                    start,
                    mut items,
                    current,
                } => {
                    if !current.is_empty() {
                        items.push(current);
                    }
                    Block::List {
                        ordered,
                        start,
                        items,
                    }
                }
            };
            self.add_block(block);
        }
        MarkdownDocument {
            blocks: self.blocks,
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(inline: &Inline) -> String {
        inline.iter().map(|span| span.text.as_str()).collect()
    }

    #[test]
    fn fenced_code_keeps_language_and_body() {
        let document = parse("Intro\n\n```rust\nfn main() {}\n```\n");
        assert_eq!(document.blocks.len(), 2);

        let Block::Code(code) = &document.blocks[1] else {
            panic!("expected code block, got {:?}", document.blocks[1]);
        };
        assert_eq!(code.language.as_deref(), Some("rust"));
        assert_eq!(code.header_label(), "rust");
        assert_eq!(code.code, "fn main() {}\n");
        assert_eq!(code.copy_text(), "fn main() {}");
    }

    #[test]
    fn blocks_without_language_are_labelled_terminal() {
        let document = parse("```\nls -la\n```\n\n```text\nplain\n```\n\n    indented\n");
        let labels = document
            .code_blocks()
            .iter()
            .map(|code| code.header_label().to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Terminal", "Terminal", "Terminal"]);
    }

    #[test]
    fn info_string_is_reduced_to_its_language_token() {
        assert_eq!(code_language("python title=\"x.py\""), Some("python".into()));
        assert_eq!(code_language("language-ts"), Some("ts".into()));
        assert_eq!(code_language("c++"), Some("c++".into()));
        assert_eq!(code_language("   "), None);
    }

    #[test]
    fn inline_styles_and_links_become_spans() {
        let document = parse("Some **bold**, *italic*, `code` and [a link](https://example.com).");
        let Block::Paragraph(inline) = &document.blocks[0] else {
            panic!("expected paragraph");
        };

        assert_eq!(plain(inline), "Some bold, italic, code and a link.");
        assert!(inline.iter().any(|span| span.text == "bold" && span.style.bold));
        assert!(inline.iter().any(|span| span.text == "italic" && span.style.italic));
        assert!(inline.iter().any(|span| span.text == "code" && span.style.code));
        assert!(inline.iter().any(|span| {
            span.text == "a link" && span.style.link.as_deref() == Some("https://example.com")
        }));
    }

    #[test]
    fn nested_lists_and_quotes_keep_structure() {
        let document = parse("- one\n  1. inner\n- two\n\n> quoted\n> - item\n");
        assert_eq!(document.blocks.len(), 2);

        let Block::List { ordered, items, .. } = &document.blocks[0] else {
            panic!("expected list");
        };
        assert!(!ordered);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0][1], Block::List { ordered: true, .. }));

        let Block::Quote(inner) = &document.blocks[1] else {
            panic!("expected quote");
        };
        assert!(matches!(inner[0], Block::Paragraph(_)));
        assert!(matches!(inner[1], Block::List { .. }));
    }

    #[test]
    fn tables_collect_header_and_rows() {
        let document = parse("| a | b |\n|:--|--:|\n| 1 | 2 |\n| 3 | 4 |\n");
        let Block::Table(table) = &document.blocks[0] else {
            panic!("expected table, got {:?}", document.blocks);
        };

        assert_eq!(table.alignments, vec![CellAlignment::Left, CellAlignment::Right]);
        assert_eq!(table.header.iter().map(plain).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(plain(&table.rows[1][0]), "3");
    }

    #[test]
    fn headings_and_rules_are_blocks() {
        let document = parse("# Title\n\ntext\n\n---\n\n### Small\n");
        assert!(matches!(document.blocks[0], Block::Heading { level: 1, .. }));
        assert!(matches!(document.blocks[2], Block::Rule));
        assert!(matches!(document.blocks[3], Block::Heading { level: 3, .. }));
    }

    #[test]
    fn only_web_and_mail_links_are_openable() {
        assert_eq!(openable_link("https://example.com"), Some("https://example.com"));
        assert_eq!(openable_link(" HTTP://example.com "), Some("HTTP://example.com"));
        assert_eq!(openable_link("mailto:me@example.com"), Some("mailto:me@example.com"));
        assert_eq!(openable_link("javascript:alert(1)"), None);
        assert_eq!(openable_link("file:///etc/passwd"), None);
        assert_eq!(openable_link("relative/path"), None);
    }

    #[test]
    fn streaming_partial_fence_still_renders_code() {
        let document = parse("```python\nprint(1)\n");
        let blocks = document.code_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "print(1)\n");
    }
}
