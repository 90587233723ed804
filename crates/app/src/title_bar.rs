use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::theme::{ThemeChanged, ThemeModel, ThemePreference};

#[cfg(target_os = "macos")]
const LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const LEFT_SAFE_PADDING: f32 = 16.0;
const THEME_MENU_WIDTH: f32 = 140.0;

/// Computes the title bar height from the window's rem size.
pub fn title_bar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

/// Icon for the theme menu button. System gets its own glyph so it never
/// reads as an explicit Light or Dark choice.
fn theme_icon(preference: ThemePreference) -> IconName {
    match preference {
        ThemePreference::Light => IconName::Sun,
        ThemePreference::Dark => IconName::Moon,
        ThemePreference::System => IconName::Palette,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleBarEvent {
    ToggleSettings,
}

pub struct TitleBar {
    theme: Entity<ThemeModel>,
    settings_open: bool,
    theme_menu_open: bool,
    should_move: bool,
    _theme_changed: Subscription,
}

impl EventEmitter<TitleBarEvent> for TitleBar {}

impl TitleBar {
    pub fn new(theme: Entity<ThemeModel>, cx: &mut Context<Self>) -> Self {
        let theme_changed = cx.subscribe(&theme, |_, _, _: &ThemeChanged, cx| cx.notify());
        Self {
            theme,
            settings_open: false,
            theme_menu_open: false,
            should_move: false,
            _theme_changed: theme_changed,
        }
    }

    pub fn set_settings_open(&mut self, open: bool, cx: &mut Context<Self>) {
        if self.settings_open != open {
            self.settings_open = open;
            cx.notify();
        }
    }

    fn toggle_theme_menu(&mut self, cx: &mut Context<Self>) {
        self.theme_menu_open = !self.theme_menu_open;
        cx.notify();
    }

    fn choose_theme(
        &mut self,
        preference: ThemePreference,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.theme_menu_open = false;
        self.theme.update(cx, |theme, cx| {
            theme.set_theme(preference, window, cx);
        });
        cx.notify();
    }

    fn render_theme_menu(&self, cx: &mut Context<Self>) -> impl IntoElement {
        let selected = self.theme.read(cx).preference();
        let items = ThemePreference::ALL.map(|preference| {
            Button::new(SharedString::from(format!(
                "title-bar-theme-{}",
                preference.label().to_lowercase()
            )))
            .ghost()
            .small()
            .w_full()
            .when(preference == selected, |button| button.icon(IconName::Check))
            .child(preference.label())
            .on_click(cx.listener(move |this, _, window, cx| {
                this.choose_theme(preference, window, cx);
            }))
        });

        let theme = cx.theme();
        deferred(
            v_flex()
                .id("title-bar-theme-menu")
                .absolute()
                .top(px(30.))
                .right_0()
                .w(px(THEME_MENU_WIDTH))
                .p_1()
                .gap_1()
                .rounded_md()
                .border_1()
                .border_color(theme.border)
                .bg(theme.background)
                .shadow_md()
                .on_mouse_down_out(cx.listener(|this, _, _window, cx| {
                    this.theme_menu_open = false;
                    cx.notify();
                }))
                .children(items),
        )
        .with_priority(1)
    }

    fn render_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("title-bar-window-controls")
                .items_center()
                // Keep control clicks out of the drag and double-click handlers.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("title-bar-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| window.minimize_window())),
                )
                .child(
                    Button::new("title-bar-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| window.zoom_window())),
                )
                .child(
                    Button::new("title-bar-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| window.remove_window())),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }
}

impl Render for TitleBar {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let height = title_bar_height(window);
        let theme_icon = theme_icon(self.theme.read(cx).preference());
        let menu = self.theme_menu_open.then(|| self.render_theme_menu(cx));
        let window_controls = self.render_window_controls(window, cx);
        let settings_icon = if self.settings_open {
            IconName::CircleX
        } else {
            IconName::Settings
        };
        let theme = cx.theme();

        h_flex()
            .id("title-bar")
            .window_control_area(WindowControlArea::Drag)
            .w_full()
            .h(height)
            .flex_shrink_0()
            .pl(px(LEFT_SAFE_PADDING))
            .pr_2()
            .items_center()
            .justify_between()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, event: &MouseDownEvent, window, _cx| {
                    if event.click_count >= 2 {
                        this.should_move = false;
                        window.zoom_window();
                    } else {
                        this.should_move = true;
                    }
                }),
            )
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.should_move = false;
                }),
            )
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.should_move = false;
            }))
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.should_move {
                    this.should_move = false;
                    window.start_window_move();
                }
            }))
            .child(
                div()
                    .text_sm()
                    .font_weight(FontWeight::MEDIUM)
                    .text_color(theme.foreground)
                    .child("Quill"),
            )
            .child(
                h_flex()
                    .items_center()
                    .gap_1()
                    .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                    .child(
                        div()
                            .relative()
                            .child(
                                Button::new("title-bar-theme")
                                    .ghost()
                                    .small()
                                    .icon(theme_icon)
                                    .on_click(cx.listener(|this, _, _window, cx| {
                                        this.toggle_theme_menu(cx);
                                    })),
                            )
                            .children(menu),
                    )
                    .child(
                        Button::new("title-bar-settings")
                            .ghost()
                            .small()
                            .icon(settings_icon)
                            .on_click(cx.listener(|_, _, _window, cx| {
                                cx.emit(TitleBarEvent::ToggleSettings);
                            })),
                    )
                    .child(window_controls),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_preference_has_a_distinct_icon() {
        assert!(matches!(theme_icon(ThemePreference::Light), IconName::Sun));
        assert!(matches!(theme_icon(ThemePreference::Dark), IconName::Moon));
        assert!(matches!(theme_icon(ThemePreference::System), IconName::Palette));
    }
}
