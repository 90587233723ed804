pub mod state;
pub mod store;

pub use state::{EffectiveTheme, SystemAppearance, ThemePreference, ThemeState};
pub use store::{PreferenceStore, Preferences, PreferencesError};

use gpui::*;
use gpui_component::{Theme, ThemeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeChanged {
    pub preference: ThemePreference,
    pub effective: EffectiveTheme,
}

/// Window-scoped owner of the theme preference. Applies the effective theme
/// to the toolkit and follows the platform appearance while the preference
/// is System.
pub struct ThemeModel {
    store: PreferenceStore,
    state: ThemeState,
    _appearance: Subscription,
}

impl EventEmitter<ThemeChanged> for ThemeModel {}

impl ThemeModel {
    pub fn new(store: PreferenceStore, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let state = ThemeState::new(store.theme(), system_appearance(window.appearance()));
        let appearance = cx.observe_window_appearance(window, |this, window, cx| {
            this.handle_appearance_change(window, cx);
        });

        tracing::info!(
            preference = %state.preference(),
            effective = ?state.effective(),
            "applying initial theme"
        );
        apply(state.effective(), window, cx);

        Self {
            store,
            state,
            _appearance: appearance,
        }
    }

    pub fn preference(&self) -> ThemePreference {
        self.state.preference()
    }

    pub fn set_theme(
        &mut self,
        preference: ThemePreference,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if let Err(error) = self.store.set_theme(preference) {
            tracing::warn!(error = %error, "failed to persist theme preference");
        }

        if let Some(effective) = self.state.set_preference(preference) {
            apply(effective, window, cx);
        }
        tracing::debug!(%preference, "theme preference changed");

        cx.emit(ThemeChanged {
            preference,
            effective: self.state.effective(),
        });
        cx.notify();
    }

    fn handle_appearance_change(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let system = system_appearance(window.appearance());
        if let Some(effective) = self.state.system_changed(system) {
            tracing::debug!(?system, "following platform appearance");
            apply(effective, window, cx);
            cx.emit(ThemeChanged {
                preference: self.state.preference(),
                effective,
            });
            cx.notify();
        }
    }
}

fn system_appearance(appearance: WindowAppearance) -> SystemAppearance {
    match appearance {
        WindowAppearance::Dark | WindowAppearance::VibrantDark => SystemAppearance::Dark,
        WindowAppearance::Light | WindowAppearance::VibrantLight => SystemAppearance::Light,
    }
}

fn apply(effective: EffectiveTheme, window: &mut Window, cx: &mut App) {
    let mode = if effective.is_dark() {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    };
    Theme::change(mode, Some(window), cx);
    window.refresh();
}
