use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::Submit;

pub const INPUT_PLACEHOLDER: &str = "Ask anything...";
const COMPOSER_MAX_WIDTH: f32 = 576.0;

/// Text that would be sent for `draft`, or `None` when there is nothing to send.
pub fn submission_text(draft: &str) -> Option<&str> {
    let trimmed = draft.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Single-box composer. Enter sends, Shift+Enter breaks the line.
pub struct MessageInput {
    draft: Entity<InputState>,
    // Shift+Enter inserts the newline itself; the enter event that follows is swallowed.
    swallow_enter: bool,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let draft = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder(INPUT_PLACEHOLDER)
                .auto_grow(1, 8)
        });

        cx.subscribe_in(&draft, window, |this, _, event: &InputEvent, window, cx| {
            let InputEvent::PressEnter { secondary } = event else {
                return;
            };
            if *secondary || std::mem::take(&mut this.swallow_enter) {
                return;
            }
            this.drop_trailing_newline(window, cx);
            this.submit(window, cx);
        })
        .detach();

        Self {
            draft,
            swallow_enter: false,
        }
    }

    pub fn focus(&self, window: &mut Window, cx: &mut Context<Self>) {
        self.draft.update(cx, |state, cx| state.focus(window, cx));
    }

    fn insert_line_break(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.swallow_enter = true;
        self.draft.update(cx, |state, cx| state.insert("\n", window, cx));
        cx.notify();
    }

    fn drop_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.draft.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(kept) = value.strip_suffix('\n') {
                state.set_value(kept.to_string(), window, cx);
            }
        });
    }

    /// Emits the trimmed draft and clears the box. Blank drafts are left alone.
    fn submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let draft = self.draft.read(cx).value().to_string();
        let Some(content) = submission_text(&draft) else {
            return;
        };

        cx.emit(Submit::new(content));
        self.draft
            .update(cx, |state, cx| state.set_value("", window, cx));
        self.swallow_enter = false;
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .w_full()
            .justify_center()
            .p_3()
            .bg(theme.background)
            .child(
                h_flex()
                    .w_full()
                    .max_w(px(COMPOSER_MAX_WIDTH))
                    .items_end()
                    .gap_2()
                    .p_2()
                    .rounded_xl()
                    .border_1()
                    .border_color(theme.border)
                    .shadow_sm()
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.insert_line_break(window, cx);
                        }
                    }))
                    .child(
                        div()
                            .flex_1()
                            .min_w_0()
                            .child(Input::new(&self.draft).w_full()),
                    )
                    .child(
                        Button::new("composer-send")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child("Send")
                            .on_click(cx.listener(|this, _, window, cx| this.submit(window, cx))),
                    ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drafts_are_trimmed_before_sending() {
        assert_eq!(submission_text("  hello there \n"), Some("hello there"));
        assert_eq!(submission_text("line one\nline two"), Some("line one\nline two"));
    }

    #[test]
    fn blank_drafts_send_nothing() {
        assert_eq!(submission_text(""), None);
        assert_eq!(submission_text(" \n\t "), None);
    }
}
