use std::ops::Range;
use std::rc::Rc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::markdown::PreparedMarkdown;
use crate::markdown::highlighter::HighlightedLine;
use crate::markdown::parser::{Block, CellAlignment, CodeBlock, Inline, InlineStyle, Table, openable_link};

#[cfg(target_os = "macos")]
pub const MONO_FONT: &str = "Menlo";
#[cfg(target_os = "windows")]
pub const MONO_FONT: &str = "Consolas";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const MONO_FONT: &str = "DejaVu Sans Mono";

/// Inline spans joined into one string with byte-range styles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatInline {
    pub text: String,
    pub styles: Vec<(Range<usize>, InlineStyle)>,
    pub links: Vec<(Range<usize>, String)>,
}

pub fn flatten_inline(inline: &Inline) -> FlatInline {
    let mut flat = FlatInline::default();
    for span in inline {
        let start = flat.text.len();
        flat.text.push_str(&span.text);
        let range = start..flat.text.len();

        if let Some(url) = span.style.link.as_deref().and_then(openable_link) {
            match flat.links.last_mut() {
                // Adjacent spans of the same link are one click target.
                Some((last, last_url)) if last.end == range.start && last_url == url => {
                    last.end = range.end;
                }
                _ => flat.links.push((range.clone(), url.to_string())),
            }
        }
        if span.style != InlineStyle::default() {
            flat.styles.push((range, span.style.clone()));
        }
    }
    flat
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    foreground: Hsla,
    muted: Hsla,
    border: Hsla,
    code_background: Hsla,
    link: Hsla,
}

impl Palette {
    fn from_app(cx: &App) -> Self {
        let theme = cx.theme();
        Self {
            foreground: theme.foreground,
            muted: theme.muted_foreground,
            border: theme.border,
            code_background: theme.muted,
            link: theme.primary,
        }
    }

    fn highlight(&self, style: &InlineStyle) -> HighlightStyle {
        let color = if style.link.is_some() {
            Some(self.link)
        } else {
            None
        };

        HighlightStyle {
            color,
            font_weight: style.bold.then_some(FontWeight::BOLD),
            font_style: style.italic.then_some(FontStyle::Italic),
            background_color: style.code.then_some(self.code_background),
            underline: style.link.is_some().then(|| UnderlineStyle {
                thickness: px(1.),
                color: Some(self.link),
                wavy: false,
            }),
            strikethrough: style.strikethrough.then(|| StrikethroughStyle {
                thickness: px(1.),
                color: Some(self.foreground),
            }),
            ..Default::default()
        }
    }
}

/// Copy button wiring for the code blocks of one message.
#[derive(Clone)]
pub struct CodeActions {
    pub copied: Rc<dyn Fn(usize) -> bool>,
    pub on_copy: Rc<dyn Fn(usize, &mut Window, &mut App)>,
}

/// Renders prepared markdown into gpui elements.
///
/// `id` must be unique among rendered messages; element ids of links and
/// copy buttons derive from it.
pub fn render_markdown(
    id: impl Into<SharedString>,
    markdown: &PreparedMarkdown,
    actions: CodeActions,
    cx: &App,
) -> AnyElement {
    let mut renderer = Renderer {
        id: id.into(),
        markdown,
        palette: Palette::from_app(cx),
        actions,
        next_code: 0,
        next_text: 0,
    };

    let blocks = renderer.blocks(&markdown.document().blocks);
    v_flex()
        .w_full()
        .gap_3()
        .text_sm()
        .text_color(renderer.palette.foreground)
        .children(blocks)
        .into_any_element()
}

struct Renderer<'a> {
    id: SharedString,
    markdown: &'a PreparedMarkdown,
    palette: Palette,
    actions: CodeActions,
    next_code: usize,
    next_text: usize,
}

impl Renderer<'_> {
    fn blocks(&mut self, blocks: &[Block]) -> Vec<AnyElement> {
        blocks.iter().map(|block| self.block(block)).collect()
    }

    fn block(&mut self, block: &Block) -> AnyElement {
        match block {
            Block::Heading { level, content } => {
                let text = self.inline(content);
                div()
                    .w_full()
                    .font_weight(FontWeight::SEMIBOLD)
                    .map(|heading| match *level {
                        1 => heading.text_xl(),
                        2 => heading.text_lg(),
                        _ => heading.text_base(),
                    })
                    .child(text)
                    .into_any_element()
            }
            Block::Paragraph(content) => div().w_full().child(self.inline(content)).into_any_element(),
            Block::Code(code) => self.code_block(code),
            Block::List {
                ordered,
                start,
                items,
            } => self.list(*ordered, *start, items),
            Block::Quote(inner) => {
                let children = self.blocks(inner);
                v_flex()
                    .w_full()
                    .gap_2()
                    .pl_3()
                    .border_l_2()
                    .border_color(self.palette.border)
                    .text_color(self.palette.muted)
                    .children(children)
                    .into_any_element()
            }
            Block::Table(table) => self.table(table),
            Block::Rule => div()
                .w_full()
                .h(px(1.))
                .bg(self.palette.border)
                .into_any_element(),
        }
    }

    fn inline(&mut self, inline: &Inline) -> AnyElement {
        let flat = flatten_inline(inline);
        let highlights = flat
            .styles
            .iter()
            .map(|(range, style)| (range.clone(), self.palette.highlight(style)))
            .collect::<Vec<_>>();
        let styled = StyledText::new(flat.text).with_highlights(highlights);

        if flat.links.is_empty() {
            return styled.into_any_element();
        }

        let index = self.next_text;
        self.next_text += 1;
        let (ranges, urls): (Vec<_>, Vec<_>) = flat.links.into_iter().unzip();
        InteractiveText::new(
            ElementId::Name(format!("{}-text-{index}", self.id).into()),
            styled,
        )
        .on_click(ranges, move |clicked, _window, cx| {
            if let Some(url) = urls.get(clicked) {
                tracing::debug!(url = %url, "opening markdown link");
                cx.open_url(url);
            }
        })
        .into_any_element()
    }

    fn list(&mut self, ordered: bool, start: u64, items: &[Vec<Block>]) -> AnyElement {
        let rows = items
            .iter()
            .enumerate()
            .map(|(offset, item)| {
                let marker = if ordered {
                    format!("{}.", start.saturating_add(offset as u64))
                } else {
                    "•".to_string()
                };
                let children = self.blocks(item);
                h_flex()
                    .w_full()
                    .items_start()
                    .gap_2()
                    .child(
                        div()
                            .min_w(px(16.))
                            .text_color(self.palette.muted)
                            .child(marker),
                    )
                    .child(v_flex().flex_1().min_w_0().gap_1().children(children))
            })
            .collect::<Vec<_>>();

        v_flex().w_full().gap_1().children(rows).into_any_element()
    }

    fn table(&mut self, table: &Table) -> AnyElement {
        let header = self.table_row(&table.header, &table.alignments, true);
        let rows = table
            .rows
            .iter()
            .map(|row| self.table_row(row, &table.alignments, false))
            .collect::<Vec<_>>();

        v_flex()
            .w_full()
            .rounded_md()
            .border_1()
            .border_color(self.palette.border)
            .overflow_hidden()
            .child(header)
            .children(rows)
            .into_any_element()
    }

    fn table_row(&mut self, cells: &[Inline], alignments: &[CellAlignment], header: bool) -> AnyElement {
        let cells = cells
            .iter()
            .enumerate()
            .map(|(column, cell)| {
                let alignment = alignments.get(column).copied().unwrap_or(CellAlignment::None);
                let content = self.inline(cell);
                div()
                    .flex_1()
                    .min_w_0()
                    .px_2()
                    .py_1()
                    .when(column > 0, |cell| cell.border_l_1().border_color(self.palette.border))
                    .map(|cell| match alignment {
                        CellAlignment::Center => cell.text_center(),
                        CellAlignment::Right => cell.text_right(),
                        CellAlignment::Left | CellAlignment::None => cell,
                    })
                    .child(content)
            })
            .collect::<Vec<_>>();

        h_flex()
            .w_full()
            .items_start()
            .when(header, |row| {
                row.font_weight(FontWeight::SEMIBOLD)
                    .bg(self.palette.code_background)
            })
            .when(!header, |row| row.border_t_1().border_color(self.palette.border))
            .children(cells)
            .into_any_element()
    }

    fn code_block(&mut self, code: &CodeBlock) -> AnyElement {
        let index = self.next_code;
        self.next_code += 1;

        let copied = (self.actions.copied)(index);
        let on_copy = self.actions.on_copy.clone();
        let lines = self
            .markdown
            .highlighted(index)
            .map(|lines| lines.iter().map(code_line).collect::<Vec<_>>())
            .unwrap_or_default();

        v_flex()
            .w_full()
            .rounded_md()
            .border_1()
            .border_color(self.palette.border)
            .bg(self.palette.code_background)
            .overflow_hidden()
            .child(
                h_flex()
                    .w_full()
                    .justify_between()
                    .items_center()
                    .px_3()
                    .py_1()
                    .border_b_1()
                    .border_color(self.palette.border)
                    .child(
                        Label::new(code.header_label().to_string())
                            .text_xs()
                            .text_color(self.palette.muted),
                    )
                    .child(
                        Button::new(ElementId::Name(
                            format!("{}-copy-{index}", self.id).into(),
                        ))
                        .ghost()
                        .small()
                        .icon(if copied { IconName::Check } else { IconName::Copy })
                        .child(if copied { "Copied" } else { "Copy" })
                        .on_click(move |_, window, cx| on_copy(index, window, cx)),
                    ),
            )
            .child(
                div()
                    .id(ElementId::Name(format!("{}-code-{index}", self.id).into()))
                    .w_full()
                    .overflow_x_scroll()
                    .px_3()
                    .py_2()
                    .font_family(MONO_FONT)
                    .text_xs()
                    .child(v_flex().children(lines)),
            )
            .into_any_element()
    }
}

fn code_line(line: &HighlightedLine) -> AnyElement {
    if line.text.is_empty() {
        return div().whitespace_nowrap().child(" ").into_any_element();
    }

    let highlights = line
        .runs
        .iter()
        .map(|(range, color)| {
            (
                range.clone(),
                HighlightStyle {
                    color: Some(rgb(color.to_hex()).into()),
                    ..Default::default()
                },
            )
        })
        .collect::<Vec<_>>();

    div()
        .whitespace_nowrap()
        .child(StyledText::new(line.text.clone()).with_highlights(highlights))
        .into_any_element()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parser::{Span, parse};

    fn span(text: &str, style: InlineStyle) -> Span {
        Span {
            text: text.to_string(),
            style,
        }
    }

    #[test]
    fn flattening_tracks_byte_ranges() {
        let bold = InlineStyle {
            bold: true,
            ..Default::default()
        };
        let flat = flatten_inline(&vec![
            span("héllo ", InlineStyle::default()),
            span("world", bold.clone()),
        ]);

        assert_eq!(flat.text, "héllo world");
        assert_eq!(flat.styles, vec![(7..12, bold)]);
        assert!(flat.links.is_empty());
    }

    #[test]
    fn link_targets_merge_and_unsafe_links_are_not_clickable() {
        let document = parse(
            "[**bold** link](https://example.com) and [bad](javascript:alert(1))",
        );
        let Block::Paragraph(inline) = &document.blocks[0] else {
            panic!("expected paragraph");
        };
        let flat = flatten_inline(inline);

        assert_eq!(flat.text, "bold link and bad");
        assert_eq!(flat.links, vec![(0..9, "https://example.com".to_string())]);
    }
}
