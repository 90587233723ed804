use std::fmt;

use serde::{Deserialize, Serialize};

/// What the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub const ALL: [ThemePreference; 3] = [Self::Light, Self::Dark, Self::System];

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::System => "System",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The platform's color scheme as last reported by the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SystemAppearance {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveTheme {
    Light,
    Dark,
}

impl EffectiveTheme {
    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

/// Preference plus the last known system appearance, and the theme they
/// resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeState {
    preference: ThemePreference,
    system: SystemAppearance,
    effective: EffectiveTheme,
}

impl ThemeState {
    pub fn new(preference: ThemePreference, system: SystemAppearance) -> Self {
        Self {
            preference,
            system,
            effective: resolve(preference, system),
        }
    }

    pub fn preference(&self) -> ThemePreference {
        self.preference
    }

    pub fn system(&self) -> SystemAppearance {
        self.system
    }

    pub fn effective(&self) -> EffectiveTheme {
        self.effective
    }

    /// Returns the new effective theme when it changed.
    pub fn set_preference(&mut self, preference: ThemePreference) -> Option<EffectiveTheme> {
        self.preference = preference;
        self.recompute()
    }

    /// Records a platform appearance change. Only a System preference reacts.
    pub fn system_changed(&mut self, system: SystemAppearance) -> Option<EffectiveTheme> {
        self.system = system;
        if self.preference != ThemePreference::System {
            return None;
        }
        self.recompute()
    }

    fn recompute(&mut self) -> Option<EffectiveTheme> {
        let next = resolve(self.preference, self.system);
        if next == self.effective {
            return None;
        }
        self.effective = next;
        Some(next)
    }
}

fn resolve(preference: ThemePreference, system: SystemAppearance) -> EffectiveTheme {
    match (preference, system) {
        (ThemePreference::Light, _) => EffectiveTheme::Light,
        (ThemePreference::Dark, _) => EffectiveTheme::Dark,
        (ThemePreference::System, SystemAppearance::Light) => EffectiveTheme::Light,
        (ThemePreference::System, SystemAppearance::Dark) => EffectiveTheme::Dark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_preference_tracks_appearance() {
        let mut state = ThemeState::new(ThemePreference::System, SystemAppearance::Light);
        assert_eq!(state.effective(), EffectiveTheme::Light);

        assert_eq!(
            state.system_changed(SystemAppearance::Dark),
            Some(EffectiveTheme::Dark)
        );
        assert_eq!(
            state.system_changed(SystemAppearance::Light),
            Some(EffectiveTheme::Light)
        );
    }

    #[test]
    fn explicit_preferences_ignore_appearance_changes() {
        for preference in [ThemePreference::Light, ThemePreference::Dark] {
            let mut state = ThemeState::new(preference, SystemAppearance::Light);
            let before = state.effective();

            assert_eq!(state.system_changed(SystemAppearance::Dark), None);
            assert_eq!(state.system_changed(SystemAppearance::Light), None);
            assert_eq!(state.effective(), before);
        }
    }

    #[test]
    fn switching_back_to_system_uses_the_latest_appearance() {
        let mut state = ThemeState::new(ThemePreference::Light, SystemAppearance::Light);
        state.system_changed(SystemAppearance::Dark);
        assert_eq!(state.effective(), EffectiveTheme::Light);

        assert_eq!(
            state.set_preference(ThemePreference::System),
            Some(EffectiveTheme::Dark)
        );
        assert_eq!(state.set_preference(ThemePreference::Dark), None);
    }

    #[test]
    fn preference_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ThemePreference::System).unwrap(),
            "\"system\""
        );
        assert_eq!(
            serde_json::from_str::<ThemePreference>("\"dark\"").unwrap(),
            ThemePreference::Dark
        );
    }
}
