use std::sync::Arc;

use gpui::*;
use gpui_component::{ActiveTheme, Sizable, button::Button, label::Label, v_flex};
use gpui_tokio_bridge::Tokio;
use quill_bridge::{BridgeConfig, HostBridge, HostKind, create_bridge};

use crate::chat::ChatView;
use crate::router::Route;
use crate::settings::{HostSummary, SettingsPage};
use crate::theme::{PreferenceStore, ThemeModel};
use crate::title_bar::{TitleBar, TitleBarEvent};

gpui::actions!(quill, [Quit, ToggleSettings]);

/// Root view of the main window: title bar over the routed page.
pub struct QuillShell {
    route: Route,
    title_bar: Entity<TitleBar>,
    chat_view: Entity<ChatView>,
    settings_page: Entity<SettingsPage>,
    _bridge_worker: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    _subscriptions: Vec<Subscription>,
}

impl QuillShell {
    pub fn new(
        bridge_config: BridgeConfig,
        start_page: &str,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let theme = cx.new(|cx| ThemeModel::new(PreferenceStore::load(), window, cx));

        let summary = host_summary(&bridge_config);
        let (bridge, bridge_worker) = match create_bridge(bridge_config) {
            Ok(handle) => {
                let worker = handle.worker.map(|worker| Tokio::spawn(cx, worker));
                (Ok::<Arc<dyn HostBridge>, String>(handle.bridge), worker)
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to start agent host");
                (Err(error.to_string()), None)
            }
        };
        let summary = HostSummary {
            error: bridge.as_ref().err().cloned(),
            ..summary
        };

        let chat_view = cx.new(|cx| ChatView::new(bridge, window, cx));
        let settings_page = cx.new(|cx| SettingsPage::new(theme.clone(), summary, cx));
        let title_bar = cx.new(|cx| TitleBar::new(theme.clone(), cx));

        let subscriptions = vec![
            cx.subscribe(&title_bar, |this, _, event: &TitleBarEvent, cx| match event {
                TitleBarEvent::ToggleSettings => this.toggle_settings(cx),
            }),
            cx.observe(&theme, |_, _, cx| cx.notify()),
        ];

        let mut this = Self {
            route: Route::Home,
            title_bar,
            chat_view,
            settings_page,
            _bridge_worker: bridge_worker,
            _subscriptions: subscriptions,
        };
        this.navigate(start_page, cx);
        this
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn navigate(&mut self, path: &str, cx: &mut Context<Self>) {
        let route = Route::parse(path);
        tracing::debug!(path, ?route, "navigating");
        let settings_open = route == Route::Settings;
        self.route = route;
        self.title_bar.update(cx, |title_bar, cx| {
            title_bar.set_settings_open(settings_open, cx);
        });
        cx.notify();
    }

    fn toggle_settings(&mut self, cx: &mut Context<Self>) {
        let target = if self.route == Route::Settings {
            Route::Home
        } else {
            Route::Settings
        };
        self.navigate(target.path(), cx);
    }

    fn on_toggle_settings(&mut self, _: &ToggleSettings, _: &mut Window, cx: &mut Context<Self>) {
        self.toggle_settings(cx);
    }

    fn render_page(&self, cx: &Context<Self>) -> AnyElement {
        match &self.route {
            Route::Home => self.chat_view.clone().into_any_element(),
            Route::Settings => self.settings_page.clone().into_any_element(),
            Route::NotFound(path) => {
                let theme = cx.theme();
                v_flex()
                    .size_full()
                    .items_center()
                    .justify_center()
                    .gap_2()
                    .child(Label::new("Page not found").text_lg())
                    .child(
                        Label::new(path.clone())
                            .text_sm()
                            .text_color(theme.muted_foreground),
                    )
                    .child(
                        Button::new("not-found-home")
                            .small()
                            .child("Back to chat")
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.navigate(Route::Home.path(), cx);
                            })),
                    )
                    .into_any_element()
            }
        }
    }
}

impl Render for QuillShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("quill-shell")
            .key_context("QuillShell")
            .on_action(cx.listener(Self::on_toggle_settings))
            .size_full()
            .bg(theme.background)
            .text_color(theme.foreground)
            .child(self.title_bar.clone())
            .child(
                div()
                    .id("quill-page")
                    .flex_1()
                    .min_h_0()
                    .overflow_hidden()
                    .child(self.render_page(cx)),
            )
    }
}

fn host_summary(config: &BridgeConfig) -> HostSummary {
    let (host, detail) = match config.kind {
        HostKind::Rig => ("Built-in agent".to_string(), config.provider.model.clone()),
        HostKind::Process => (
            "Agent process".to_string(),
            config
                .agent_command
                .as_ref()
                .map(|command| command.display())
                .unwrap_or_else(|| "no command configured".to_string()),
        ),
    };
    HostSummary {
        host,
        detail,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_bridge::{AgentCommand, ProviderConfig};

    #[test]
    fn summary_describes_the_selected_host() {
        let provider = ProviderConfig::new("", "https://api.openai.com/v1", "gpt-4o-mini");
        let rig = host_summary(&BridgeConfig {
            kind: HostKind::Rig,
            provider: provider.clone(),
            agent_command: None,
        });
        assert_eq!(rig.detail, "gpt-4o-mini");

        let process = host_summary(&BridgeConfig {
            kind: HostKind::Process,
            provider,
            agent_command: AgentCommand::parse("goose acp"),
        });
        assert_eq!(process.host, "Agent process");
        assert_eq!(process.detail, "goose acp");
    }
}
