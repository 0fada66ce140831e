use crate::storage::Store;
use ratatui::prelude::Color;
use std::env;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// Colours the TUI draws with for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Theme> {
        match raw {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Dark => Palette {
                background: Color::Rgb(16, 18, 24),
                surface: Color::Rgb(22, 24, 30),
                text: Color::Gray,
                muted: Color::DarkGray,
                border: Color::DarkGray,
                accent: Color::Cyan,
                highlight_bg: Color::Rgb(252, 214, 112),
                highlight_fg: Color::Black,
                success: Color::LightGreen,
                warning: Color::LightYellow,
                error: Color::LightRed,
            },
            Theme::Light => Palette {
                background: Color::Rgb(248, 248, 244),
                surface: Color::Rgb(236, 236, 230),
                text: Color::Black,
                muted: Color::Rgb(110, 110, 110),
                border: Color::Rgb(160, 160, 160),
                accent: Color::Blue,
                highlight_bg: Color::Rgb(30, 64, 175),
                highlight_fg: Color::White,
                success: Color::Green,
                warning: Color::Rgb(180, 110, 0),
                error: Color::Red,
            },
        }
    }
}

/// Reads the terminal's `COLORFGBG` hint ("fg;bg"). Background colours 0-6
/// and 8 are dark; the rest are light.
pub fn theme_from_colorfgbg(value: &str) -> Option<Theme> {
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(match bg {
        0..=6 | 8 => Theme::Dark,
        _ => Theme::Light,
    })
}

pub fn system_theme() -> Theme {
    env::var("COLORFGBG")
        .ok()
        .and_then(|v| theme_from_colorfgbg(&v))
        .unwrap_or(Theme::Dark)
}

pub struct ThemeManager {
    store: Store,
    current: Theme,
}

impl ThemeManager {
    /// A stored choice wins over the system preference.
    pub fn new(store: Store, system: Theme) -> Self {
        let current = store.load_theme().unwrap_or(system);
        ThemeManager { store, current }
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn palette(&self) -> Palette {
        self.current.palette()
    }

    pub fn toggle(&mut self) -> Theme {
        self.set(self.current.toggled());
        self.current
    }

    /// Applies and persists an explicit choice.
    pub fn set(&mut self, theme: Theme) {
        self.current = theme;
        if let Err(err) = self.store.save_theme(theme) {
            warn!(error = %format!("{:#}", err), "could not persist theme");
        }
    }

    /// Follows the system preference only while no explicit choice is stored.
    pub fn system_changed(&mut self, system: Theme) {
        if self.store.load_theme().is_none() && self.current != system {
            debug!(theme = system.as_str(), "following system theme");
            self.current = system;
        }
    }
}
