//! Color palette and preset styles for the terminal UI.
//!
//! Risk is always shown green/amber/red for healthy/prediabetic/diabetic.

use ratatui::style::{Color, Modifier, Style};

use crate::domain::RiskClass;

/// Inline product name for headers
pub const LOGO_SMALL: &str = "Glycorisk";

/// Application color palette.
pub struct Theme;

impl Theme {
    /// Indigo accent
    pub const ACCENT: Color = Color::Rgb(99, 102, 241); // #6366F1
    pub const ACCENT_LIGHT: Color = Color::Rgb(165, 180, 252); // #A5B4FC
    pub const OUTLINE: Color = Color::Rgb(113, 113, 122); // #71717A
    pub const BACKDROP: Color = Color::Rgb(24, 24, 27); // #18181B

    pub const GOOD: Color = Color::Rgb(34, 197, 94); // #22C55E
    pub const CAUTION: Color = Color::Rgb(245, 158, 11); // #F59E0B
    pub const ALERT: Color = Color::Rgb(239, 68, 68); // #EF4444
    pub const NOTE: Color = Color::Rgb(56, 189, 248); // #38BDF8

    pub const FG: Color = Color::Rgb(244, 244, 245); // #F4F4F5
    pub const FG_DIM: Color = Color::Rgb(161, 161, 170); // #A1A1AA
    pub const FG_FAINT: Color = Color::Rgb(113, 113, 122); // #71717A

    fn fg(color: Color) -> Style {
        Style::default().fg(color)
    }

    fn bold(color: Color) -> Style {
        Self::fg(color).add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn title() -> Style {
        Self::bold(Self::FG)
    }

    /// Block titles and section headings
    #[must_use]
    pub fn subtitle() -> Style {
        Self::bold(Self::ACCENT_LIGHT)
    }

    #[must_use]
    pub fn text() -> Style {
        Self::fg(Self::FG)
    }

    #[must_use]
    pub fn text_secondary() -> Style {
        Self::fg(Self::FG_DIM)
    }

    /// Placeholders and empty-state messages
    #[must_use]
    pub fn text_muted() -> Style {
        Self::fg(Self::FG_FAINT)
    }

    #[must_use]
    pub fn success() -> Style {
        Self::fg(Self::GOOD)
    }

    #[must_use]
    pub fn warning() -> Style {
        Self::fg(Self::CAUTION)
    }

    #[must_use]
    pub fn danger() -> Style {
        Self::fg(Self::ALERT)
    }

    #[must_use]
    pub fn info() -> Style {
        Self::fg(Self::NOTE)
    }

    /// Highlighted table row
    #[must_use]
    pub fn selected() -> Style {
        Self::bold(Self::BACKDROP).bg(Self::ACCENT)
    }

    /// Label of the form field being edited
    #[must_use]
    pub fn focused() -> Style {
        Self::bold(Self::ACCENT_LIGHT)
    }

    #[must_use]
    pub fn border() -> Style {
        Self::fg(Self::OUTLINE)
    }

    #[must_use]
    pub fn border_focused() -> Style {
        Self::fg(Self::ACCENT)
    }

    /// Footer key, e.g. `[Esc]`
    #[must_use]
    pub fn key_hint() -> Style {
        Self::bold(Self::ACCENT_LIGHT)
    }

    #[must_use]
    pub fn key_desc() -> Style {
        Self::fg(Self::FG_DIM)
    }

    #[must_use]
    pub fn risk_class(class: RiskClass) -> Style {
        match class {
            RiskClass::Healthy => Self::success(),
            RiskClass::Prediabetic => Self::warning(),
            RiskClass::Diabetic => Self::danger(),
        }
    }

    /// Gauge style for a risk fraction in `[0, 1]`
    #[must_use]
    pub fn gauge(risk: f64) -> Style {
        match risk {
            r if r >= 0.5 => Self::danger(),
            r if r >= 0.25 => Self::warning(),
            _ => Self::success(),
        }
    }
}
