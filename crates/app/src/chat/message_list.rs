use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex, v_virtual_list};

use crate::chat::message::{ChatMessage, MessageId, Role};
use crate::chat::scroll_manager::ScrollManager;
use crate::markdown::{COPIED_FEEDBACK, CodeActions, CopyFeedback, PreparedMarkdown, render_markdown};

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const BUBBLE_PADDING_X: Pixels = px(14.);
const BUBBLE_PADDING_Y: Pixels = px(10.);
const TIMESTAMP_HEIGHT: Pixels = px(16.);
const TIMESTAMP_GAP: Pixels = px(4.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;
const MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES: usize = 128 * 1024;

type CopyKey = (MessageId, usize);

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

struct MarkdownCacheEntry {
    content_hash: u64,
    markdown: Rc<PreparedMarkdown>,
}

/// Virtualized transcript: user bubbles on the right, assistant markdown on
/// the left, each with its timestamp underneath.
pub struct MessageList {
    messages: Vec<ChatMessage>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_manager: ScrollManager,
    size_cache: HashMap<MessageId, SizeCacheEntry>,
    markdown_cache: HashMap<MessageId, MarkdownCacheEntry>,
    copy_feedback: CopyFeedback<CopyKey>,
    copy_tasks: HashMap<CopyKey, Task<()>>,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_manager: ScrollManager::new(),
            size_cache: HashMap::new(),
            markdown_cache: HashMap::new(),
            copy_feedback: CopyFeedback::new(),
            copy_tasks: HashMap::new(),
            content_width: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn set_messages(&mut self, messages: Vec<ChatMessage>, cx: &mut Context<Self>) {
        let appended_user = messages.len() > self.messages.len()
            && messages.last().is_some_and(|message| message.role == Role::User);
        let changed = messages != self.messages;

        self.messages = messages;
        self.rebuild_item_sizes();

        let active_ids = self
            .messages
            .iter()
            .map(|message| message.id.clone())
            .collect::<HashSet<_>>();
        self.markdown_cache.retain(|id, _| active_ids.contains(id));
        self.copy_feedback.retain(|(id, _)| active_ids.contains(id));
        self.copy_tasks.retain(|(id, _), _| active_ids.contains(id));

        if appended_user {
            // The reader just sent something; always show it.
            self.scroll_manager.jump_to_tail();
        } else if changed {
            self.scroll_manager.content_grew();
        }

        cx.notify();
    }

    fn copy_code(&mut self, message_id: MessageId, block: usize, cx: &mut Context<Self>) {
        let Some(code) = self
            .markdown_cache
            .get(&message_id)
            .and_then(|entry| entry.markdown.code_text(block))
        else {
            return;
        };

        cx.write_to_clipboard(ClipboardItem::new_string(code));
        tracing::debug!(message_id = %message_id, block, "copied code block");

        let key = (message_id, block);
        let generation = self.copy_feedback.mark_copied(key.clone());
        let expire_key = key.clone();
        let task = cx.spawn(async move |this, cx| {
            cx.background_executor().timer(COPIED_FEEDBACK).await;
            let _ = this.update(cx, |this, cx| {
                if this.copy_feedback.expire(&expire_key, generation) {
                    this.copy_tasks.remove(&expire_key);
                    cx.notify();
                }
            });
        });
        // Replacing the task cancels the previous timer for this button.
        self.copy_tasks.insert(key, task);
        cx.notify();
    }

    fn prepared_markdown(&mut self, message: &ChatMessage, dark: bool) -> Rc<PreparedMarkdown> {
        let content_hash = hash_content(&message.content);
        if let Some(entry) = self.markdown_cache.get(&message.id)
            && entry.content_hash == content_hash
            && entry.markdown.is_dark() == dark
        {
            return entry.markdown.clone();
        }

        let markdown = Rc::new(PreparedMarkdown::new(&message.content, dark));
        self.markdown_cache.insert(
            message.id.clone(),
            MarkdownCacheEntry {
                content_hash,
                markdown: markdown.clone(),
            },
        );
        markdown
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            // Heights measured at the old width no longer hold.
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let mut active_ids = HashSet::with_capacity(self.messages.len());
        let mut sizes = Vec::with_capacity(self.messages.len());

        for message in &self.messages {
            let next_hash = layout_hash(message);
            let estimated_height = estimate_message_height(message, content_width);

            let entry = self
                .size_cache
                .entry(message.id.clone())
                .or_insert(SizeCacheEntry {
                    layout_hash: next_hash,
                    height: estimated_height,
                    measured: false,
                });

            if entry.layout_hash != next_hash {
                entry.layout_hash = next_hash;
                entry.height = estimated_height;
                entry.measured = false;
            } else if !entry.measured {
                entry.height = estimated_height;
            }

            sizes.push(size(px(0.), entry.height));
            active_ids.insert(message.id.clone());
        }

        self.size_cache.retain(|id, _| active_ids.contains(id));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.messages.is_empty() {
            return;
        }

        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(message) = self.messages.get(index).cloned() else {
                continue;
            };

            let next_hash = layout_hash(&message);
            {
                let estimated_height = estimate_message_height(&message, content_width);
                let entry = self
                    .size_cache
                    .entry(message.id.clone())
                    .or_insert(SizeCacheEntry {
                        layout_hash: next_hash,
                        height: estimated_height,
                        measured: false,
                    });

                if entry.layout_hash != next_hash {
                    entry.layout_hash = next_hash;
                    entry.height = estimated_height;
                    entry.measured = false;
                }
            }

            let mut row = self.render_message_row(&message, cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&message.id) else {
                continue;
            };
            if !entry.measured || pixels_changed(entry.height, measured_height) {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_message_row(&mut self, message: &ChatMessage, cx: &mut Context<Self>) -> AnyElement {
        let is_user = message.role == Role::User;
        let bubble = if is_user {
            self.render_user_bubble(message, cx)
        } else {
            self.render_assistant_bubble(message, cx)
        };

        let theme = cx.theme();
        let row = v_flex().w_full().gap(TIMESTAMP_GAP);
        let row = if is_user { row.items_end() } else { row.items_start() };
        row.child(bubble)
            .child(
                Label::new(message.time_label())
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .into_any_element()
    }

    fn render_user_bubble(&self, message: &ChatMessage, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let content = if message.content.is_empty() {
            " ".to_string()
        } else {
            message.content.clone()
        };

        div()
            .max_w(USER_BUBBLE_MAX_WIDTH)
            .px(BUBBLE_PADDING_X)
            .py(BUBBLE_PADDING_Y)
            .rounded_lg()
            .bg(theme.accent)
            .text_color(theme.accent_foreground)
            .child(Label::new(content).text_sm())
            .into_any_element()
    }

    fn render_assistant_bubble(&mut self, message: &ChatMessage, cx: &mut Context<Self>) -> AnyElement {
        let (border, background) = {
            let theme = cx.theme();
            (theme.border, theme.background)
        };
        let bubble = div()
            .w_full()
            .px(BUBBLE_PADDING_X)
            .py(BUBBLE_PADDING_Y)
            .rounded_lg()
            .border_1()
            .border_color(border)
            .bg(background);

        if message.content.len() > MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES {
            // Oversized payloads skip markdown so layout stays predictable.
            return bubble
                .child(Label::new(message.content.clone()).text_sm())
                .into_any_element();
        }

        let dark = cx.theme().mode.is_dark();
        let markdown = self.prepared_markdown(message, dark);

        let copied = {
            let copied_blocks = self
                .copy_feedback_blocks(&message.id)
                .collect::<HashSet<_>>();
            Rc::new(move |block: usize| copied_blocks.contains(&block)) as Rc<dyn Fn(usize) -> bool>
        };
        let entity = cx.entity().downgrade();
        let message_id = message.id.clone();
        let on_copy = Rc::new(move |block: usize, _: &mut Window, cx: &mut App| {
            let message_id = message_id.clone();
            let _ = entity.update(cx, |this, cx| this.copy_code(message_id, block, cx));
        }) as Rc<dyn Fn(usize, &mut Window, &mut App)>;

        let id = format!("assistant-markdown-{}", message.id);
        bubble
            .child(render_markdown(id, &markdown, CodeActions { copied, on_copy }, cx))
            .into_any_element()
    }

    fn copy_feedback_blocks<'a>(&'a self, id: &'a MessageId) -> impl Iterator<Item = usize> + 'a {
        self.copy_tasks
            .keys()
            .filter(move |key| key.0 == *id && self.copy_feedback.is_copied(key))
            .map(|(_, block)| *block)
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        self.scroll_manager.sync();

        v_flex().size_full().min_h_0().child(
            v_virtual_list(
                cx.entity().clone(),
                "message-list",
                self.item_sizes.clone(),
                |this, visible_range, window, cx| {
                    // Only visible rows are laid out, so long histories stay cheap.
                    this.update_content_width(cx);
                    this.measure_visible_items(visible_range.clone(), window, cx);
                    visible_range
                        .filter_map(|index| {
                            this.messages
                                .get(index)
                                .cloned()
                                .map(|message| this.render_message_row(&message, cx))
                        })
                        .collect::<Vec<_>>()
                },
            )
            .size_full()
            .px_4()
            .py_3()
            .gap_4()
            .track_scroll(self.scroll_manager.handle()),
        )
    }
}

fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(content.as_bytes());
    hasher.finish()
}

fn layout_hash(message: &ChatMessage) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(message.id.as_str().as_bytes());
    hasher.write_u8(match message.role {
        Role::User => 1,
        Role::Assistant => 2,
    });
    hasher.write(message.content.as_bytes());
    hasher.finish()
}

fn estimate_message_height(message: &ChatMessage, content_width: Pixels) -> Pixels {
    let bubble_width = match message.role {
        Role::User => min_pixels(content_width, USER_BUBBLE_MAX_WIDTH),
        Role::Assistant => content_width,
    };
    let text_width = max_pixels(px(1.), bubble_width - BUBBLE_PADDING_X * 2);
    let text_height = estimate_text_height(&message.content, text_width);

    text_height + BUBBLE_PADDING_Y * 2 + TIMESTAMP_GAP + TIMESTAMP_HEIGHT
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let chars_per_line = (f32::from(width) / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(index: usize) -> ChatMessage {
        let role = if index % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        };
        ChatMessage::new(
            MessageId::new(format!("m{index}")),
            role,
            format!("message-{index}: virtualization fixture payload"),
            Utc::now(),
        )
    }

    #[test]
    fn streaming_tail_only_invalidates_the_last_row() {
        let mut messages = (0..2_000).map(message).collect::<Vec<_>>();
        let width = px(680.);

        let hashes_before = messages.iter().map(layout_hash).collect::<Vec<_>>();
        assert!(
            messages
                .iter()
                .all(|message| estimate_message_height(message, width) > Pixels::ZERO)
        );

        if let Some(last) = messages.last_mut() {
            last.content.push_str(" and more streamed text");
        }

        let hashes_after = messages.iter().map(layout_hash).collect::<Vec<_>>();
        assert_eq!(hashes_before[..1_999], hashes_after[..1_999]);
        assert_ne!(hashes_before[1_999], hashes_after[1_999]);
    }

    #[test]
    fn user_bubbles_wrap_at_their_max_width() {
        let long = "x".repeat(400);
        let user = ChatMessage::user(MessageId::new("u"), long.clone(), Utc::now());
        let assistant = ChatMessage::assistant(MessageId::new("a"), long, Utc::now());

        let width = px(1200.);
        assert!(estimate_message_height(&user, width) > estimate_message_height(&assistant, width));
    }

    #[test]
    fn text_height_counts_wrapped_and_trailing_lines() {
        let width = px(70.);
        assert_eq!(estimate_text_height("", width), ESTIMATED_TEXT_LINE_HEIGHT);
        assert_eq!(estimate_text_height("short", width), ESTIMATED_TEXT_LINE_HEIGHT);
        assert_eq!(
            estimate_text_height(&"y".repeat(25), width),
            ESTIMATED_TEXT_LINE_HEIGHT * 3
        );
        assert_eq!(
            estimate_text_height("one\n", width),
            ESTIMATED_TEXT_LINE_HEIGHT * 2
        );
    }
}
