/// Top-level pages of the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Home,
    Settings,
    NotFound(String),
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let normalized = trimmed.trim_end_matches('/');
        match normalized {
            "" if trimmed.starts_with('/') => Self::Home,
            "/settings" => Self::Settings,
            _ => Self::NotFound(trimmed.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Home => "/",
            Self::Settings => "/settings",
            Self::NotFound(path) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_paths_resolve() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/settings"), Route::Settings);
        assert_eq!(Route::parse("/settings/"), Route::Settings);
    }

    #[test]
    fn anything_else_is_not_found() {
        for path in ["/chat/42", "settings", "", "/Settings"] {
            assert_eq!(Route::parse(path), Route::NotFound(path.to_string()));
        }
    }

    #[test]
    fn paths_round_trip() {
        for route in [Route::Home, Route::Settings, Route::NotFound("/x".into())] {
            assert_eq!(Route::parse(route.path()), route);
        }
    }
}
