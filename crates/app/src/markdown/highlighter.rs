use std::ops::Range;
use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

const DARK_THEME: &str = "base16-ocean.dark";
const LIGHT_THEME: &str = "InspiredGitHub";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

/// One source line; `runs` index into `text` by byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedLine {
    pub text: String,
    pub runs: Vec<(Range<usize>, Rgb)>,
}

impl HighlightedLine {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            runs: Vec::new(),
        }
    }
}

struct Highlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

fn highlighter() -> &'static Highlighter {
    static HIGHLIGHTER: OnceLock<Highlighter> = OnceLock::new();
    HIGHLIGHTER.get_or_init(|| Highlighter {
        syntaxes: SyntaxSet::load_defaults_newlines(),
        themes: ThemeSet::load_defaults(),
    })
}

impl Highlighter {
    fn syntax(&self, language: &str) -> Option<&SyntaxReference> {
        let lower = language.to_lowercase();
        let token = match lower.as_str() {
            "js" | "jsx" => "javascript",
            "ts" | "tsx" => "typescript",
            "py" => "python",
            "rb" => "ruby",
            "rs" => "rust",
            "sh" | "zsh" | "shell" | "console" => "bash",
            "yml" => "yaml",
            "md" => "markdown",
            "c++" => "cpp",
            "c#" | "csharp" => "cs",
            other => other,
        };

        self.syntaxes
            .find_syntax_by_token(token)
            .or_else(|| self.syntaxes.find_syntax_by_extension(token))
    }

    fn theme(&self, dark: bool) -> Option<&Theme> {
        let name = if dark { DARK_THEME } else { LIGHT_THEME };
        self.themes
            .themes
            .get(name)
            .or_else(|| self.themes.themes.values().next())
    }
}

/// Whether a fence language maps to a known grammar.
pub fn is_supported(language: &str) -> bool {
    highlighter().syntax(language).is_some()
}

/// Highlights `code` line by line. Unknown languages come back unstyled.
pub fn highlight(code: &str, language: Option<&str>, dark: bool) -> Vec<HighlightedLine> {
    let code = code.strip_suffix('\n').unwrap_or(code);
    let highlighter = highlighter();

    let styled = language
        .and_then(|language| highlighter.syntax(language))
        .zip(highlighter.theme(dark));
    let Some((syntax, theme)) = styled else {
        return code.split('\n').map(HighlightedLine::plain).collect();
    };

    let mut lines = HighlightLines::new(syntax, theme);
    LinesWithEndings::from(code)
        .map(|line| match lines.highlight_line(line, &highlighter.syntaxes) {
            Ok(regions) => {
                let mut text = String::with_capacity(line.len());
                let mut runs = Vec::with_capacity(regions.len());
                for (style, piece) in regions {
                    let piece = piece.trim_end_matches(['\n', '\r']);
                    if piece.is_empty() {
                        continue;
                    }
                    let start = text.len();
                    text.push_str(piece);
                    let color = Rgb {
                        r: style.foreground.r,
                        g: style.foreground.g,
                        b: style.foreground.b,
                    };
                    runs.push((start..text.len(), color));
                }
                HighlightedLine { text, runs }
            }
            Err(error) => {
                tracing::debug!(%error, "syntax highlighting failed for line");
                HighlightedLine::plain(line.trim_end_matches(['\n', '\r']))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_grammars() {
        for language in ["rust", "rs", "py", "js", "sh", "json"] {
            assert!(is_supported(language), "{language} should be supported");
        }
        assert!(!is_supported("definitely-not-a-language"));
    }

    #[test]
    fn highlighted_runs_cover_each_line() {
        let lines = highlight("fn main() {\n    let x = 1;\n}\n", Some("rust"), true);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "    let x = 1;");

        for line in &lines {
            let covered: usize = line.runs.iter().map(|(range, _)| range.len()).sum();
            assert_eq!(covered, line.text.len());
        }
        assert!(lines[0].runs.len() > 1);
    }

    #[test]
    fn unknown_language_is_plain_text() {
        let lines = highlight("a\nb", Some("nope"), false);
        assert_eq!(
            lines,
            vec![HighlightedLine::plain("a"), HighlightedLine::plain("b")]
        );

        let lines = highlight("echo hi\n", None, true);
        assert_eq!(lines, vec![HighlightedLine::plain("echo hi")]);
    }

    #[test]
    fn light_and_dark_pick_different_palettes() {
        let dark = highlight("let x = 1;", Some("rust"), true);
        let light = highlight("let x = 1;", Some("rust"), false);
        assert_eq!(dark[0].text, light[0].text);
        assert_ne!(dark[0].runs, light[0].runs);
    }
}
