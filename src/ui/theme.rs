use crate::infra::{KeyValueStorage, StorageError};
use crossterm::style::Color;

pub const THEME_STORAGE_KEY: &str = "chatsystem-theme";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Unknown or missing values read as the default.
    pub fn load(storage: &dyn KeyValueStorage) -> Self {
        storage
            .get(THEME_STORAGE_KEY)
            .as_deref()
            .and_then(Self::parse)
            .unwrap_or_default()
    }

    pub fn save(self, storage: &dyn KeyValueStorage) -> Result<(), StorageError> {
        storage.set(THEME_STORAGE_KEY, self.as_str())
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Light => LIGHT,
            Self::Dark => DARK,
        }
    }
}

// Keep the two palettes role-for-role identical; add roles here instead of
// picking colors at call sites.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Palette {
    pub fg: Color,
    pub muted: Color,
    pub accent: Color,
    pub outbound: Color,
    pub success: Color,
    pub error: Color,
}

const DARK: Palette = Palette {
    fg: Color::Rgb { r: 229, g: 231, b: 235 },
    muted: Color::Rgb { r: 156, g: 163, b: 175 },
    accent: Color::Rgb { r: 255, g: 159, b: 26 },
    outbound: Color::Rgb { r: 125, g: 211, b: 252 },
    success: Color::Rgb { r: 134, g: 239, b: 172 }, // live indicator
    error: Color::Rgb { r: 248, g: 113, b: 113 },
};

const LIGHT: Palette = Palette {
    fg: Color::Rgb { r: 17, g: 24, b: 39 },
    muted: Color::Rgb { r: 107, g: 114, b: 128 },
    accent: Color::Rgb { r: 194, g: 65, b: 12 },
    outbound: Color::Rgb { r: 3, g: 105, b: 161 },
    success: Color::Rgb { r: 21, g: 128, b: 61 },
    error: Color::Rgb { r: 185, g: 28, b: 28 },
};
