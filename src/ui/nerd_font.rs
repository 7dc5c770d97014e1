/// Nerd font glyphs used in provisioning output.
///
/// Only the icons the runner actually prints are listed; all of them live in
/// the Font Awesome range so they render with any patched nerd font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    // Status
    Check,
    Cross,
    Warning,
    Info,
    Skip,
    // Provisioning
    Key,
    Terminal,
    Git,
    Link,
    Palette,
    Rocket,
    Refresh,
}

impl NerdFont {
    /// Get the unicode character for this icon
    pub fn unicode(&self) -> char {
        match self {
            Self::Check => '\u{f00c}',    // fa-check
            Self::Cross => '\u{f00d}',    // fa-times
            Self::Warning => '\u{f071}',  // fa-exclamation-triangle
            Self::Info => '\u{f05a}',     // fa-info-circle
            Self::Skip => '\u{f051}',     // fa-step-forward

            Self::Key => '\u{f084}',      // fa-key
            Self::Terminal => '\u{f120}', // fa-terminal
            Self::Git => '\u{f1d3}',      // fa-git
            Self::Link => '\u{f0c1}',     // fa-link
            Self::Palette => '\u{f53f}',  // fa-palette
            Self::Rocket => '\u{f135}',   // fa-rocket
            Self::Refresh => '\u{f021}',  // fa-refresh
        }
    }
}

impl std::fmt::Display for NerdFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unicode())
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}
