use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};
use quill_bridge::HostBridge;

use crate::chat::events::Submit;
use crate::chat::session::{ChatSession, ChatSessionEvent};
use crate::chat::{MessageInput, MessageList};

/// Home route: transcript above, composer below, both bound to one session.
pub struct ChatView {
    session: Entity<ChatSession>,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    _subscriptions: Vec<Subscription>,
}

impl ChatView {
    pub fn new(
        bridge: Result<Arc<dyn HostBridge>, String>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let session = cx.new(|cx| ChatSession::new(bridge, cx));
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        let subscriptions = vec![
            cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
                this.handle_submit(event, cx);
            }),
            cx.subscribe_in(
                &session,
                window,
                |this, _, event: &ChatSessionEvent, window, cx| {
                    this.handle_session_event(*event, window, cx);
                },
            ),
        ];

        Self {
            session,
            message_list,
            message_input,
            _subscriptions: subscriptions,
        }
    }

    fn handle_submit(&mut self, event: &Submit, cx: &mut Context<Self>) {
        self.session.update(cx, |session, cx| {
            session.send_message(&event.content, cx);
        });
    }

    fn handle_session_event(
        &mut self,
        event: ChatSessionEvent,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        match event {
            ChatSessionEvent::Ready => {
                self.message_input.update(cx, |input, cx| input.focus(window, cx));
            }
            ChatSessionEvent::LogChanged => {
                let messages = self.session.read(cx).messages().to_vec();
                self.message_list.update(cx, |list, cx| {
                    list.set_messages(messages, cx);
                });
            }
        }
        cx.notify();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let session = self.session.read(cx);
        let host_error = session.host_error().map(str::to_string);
        let connecting = host_error.is_none() && session.session_id().is_none();
        let is_empty = session.messages().is_empty();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .when_some(host_error, |view, error| {
                view.child(
                    div()
                        .w_full()
                        .px_4()
                        .py_2()
                        .border_b_1()
                        .border_color(theme.border)
                        .text_sm()
                        .text_color(theme.danger)
                        .child(format!("Agent host unavailable: {error}")),
                )
            })
            .child(
                div()
                    .id("chat-view-message-list")
                    .relative()
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone())
                    .when(is_empty, |list| {
                        list.child(
                            div()
                                .absolute()
                                .inset_0()
                                .flex()
                                .items_center()
                                .justify_center()
                                .child(
                                    Label::new(if connecting {
                                        "Connecting to agent..."
                                    } else {
                                        "Start a conversation"
                                    })
                                    .text_sm()
                                    .text_color(theme.muted_foreground),
                                ),
                        )
                    }),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
