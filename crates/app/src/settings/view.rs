use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::theme::{ThemeChanged, ThemeModel, ThemePreference};

/// Read-only description of the running agent host shown on the settings page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSummary {
    pub host: String,
    pub detail: String,
    pub error: Option<String>,
}

pub struct SettingsPage {
    theme: Entity<ThemeModel>,
    host: HostSummary,
    _theme_changed: Subscription,
}

impl SettingsPage {
    pub fn new(theme: Entity<ThemeModel>, host: HostSummary, cx: &mut Context<Self>) -> Self {
        let theme_changed = cx.subscribe(&theme, |_, _, _: &ThemeChanged, cx| cx.notify());
        Self {
            theme,
            host,
            _theme_changed: theme_changed,
        }
    }

    fn select(&mut self, preference: ThemePreference, window: &mut Window, cx: &mut Context<Self>) {
        self.theme.update(cx, |theme, cx| {
            theme.set_theme(preference, window, cx);
        });
    }

    fn render_theme_section(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let selected = self.theme.read(cx).preference();
        let buttons = ThemePreference::ALL.map(|preference| {
            Button::new(SharedString::from(format!(
                "settings-theme-{}",
                preference.label().to_lowercase()
            )))
            .small()
            .when(preference == selected, |button| button.primary())
            .when(preference != selected, |button| button.ghost())
            .child(preference.label())
            .on_click(cx.listener(move |this, _, window, cx| {
                this.select(preference, window, cx);
            }))
        });

        let theme = cx.theme();
        v_flex()
            .gap_1()
            .child(
                div()
                    .text_sm()
                    .text_color(theme.foreground)
                    .child("Appearance"),
            )
            .child(h_flex().gap_2().children(buttons))
    }
}

impl Render for SettingsPage {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme_section = self.render_theme_section(cx);
        let theme = cx.theme();

        v_flex()
            .id("settings-page")
            .size_full()
            .gap_6()
            .p_6()
            .bg(theme.background)
            .child(
                div()
                    .text_lg()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child("Settings"),
            )
            .child(theme_section)
            .child(
                v_flex()
                    .gap_1()
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.foreground)
                            .child("Agent host"),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(format!("{} ({})", self.host.host, self.host.detail)),
                    )
                    .when_some(self.host.error.clone(), |section, error| {
                        section.child(div().text_sm().text_color(theme.danger).child(error))
                    }),
            )
    }
}
