//! Chat theme identifiers and their paired assets.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A selectable chat theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    /// light
    Light,
    /// dark
    Dark,
    /// cupcake
    Cupcake,
    /// bumblebee
    Bumblebee,
    /// retro
    Retro,
    /// valentine
    Valentine,
    /// halloween
    Halloween,
    /// garden
    Garden,
    /// forest
    Forest,
    /// aqua
    Aqua,
    /// luxury
    Luxury,
    /// dracula
    Dracula,
    /// lemonade
    Lemonade,
    /// night
    Night,
    /// coffee (default)
    #[default]
    Coffee,
    /// winter
    Winter,
    /// sunset
    Sunset,
}

/// Background and chat wallpaper for a theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeAssets {
    /// Page background image path
    pub background: String,
    /// Conversation wallpaper image path
    pub chat_wallpaper: String,
}

impl Theme {
    /// Every theme, in picker order.
    pub const ALL: [Theme; 17] = [
        Theme::Light,
        Theme::Dark,
        Theme::Cupcake,
        Theme::Bumblebee,
        Theme::Retro,
        Theme::Valentine,
        Theme::Halloween,
        Theme::Garden,
        Theme::Forest,
        Theme::Aqua,
        Theme::Luxury,
        Theme::Dracula,
        Theme::Lemonade,
        Theme::Night,
        Theme::Coffee,
        Theme::Winter,
        Theme::Sunset,
    ];

    /// Persisted identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Cupcake => "cupcake",
            Theme::Bumblebee => "bumblebee",
            Theme::Retro => "retro",
            Theme::Valentine => "valentine",
            Theme::Halloween => "halloween",
            Theme::Garden => "garden",
            Theme::Forest => "forest",
            Theme::Aqua => "aqua",
            Theme::Luxury => "luxury",
            Theme::Dracula => "dracula",
            Theme::Lemonade => "lemonade",
            Theme::Night => "night",
            Theme::Coffee => "coffee",
            Theme::Winter => "winter",
            Theme::Sunset => "sunset",
        }
    }

    /// Theme for a stored identifier; unknown or missing ids give the default.
    pub fn resolve(id: Option<&str>) -> Theme {
        id.and_then(|id| id.parse().ok()).unwrap_or_default()
    }

    /// Asset paths for this theme.
    pub fn assets(&self) -> ThemeAssets {
        ThemeAssets {
            background: format!("/backgrounds/{}.jpg", self.id()),
            chat_wallpaper: format!("/chats/{}.png", self.id()),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Unknown theme identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme: {0}")]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .iter()
            .copied()
            .find(|t| t.id() == s)
            .ok_or_else(|| UnknownTheme(s.to_string()))
    }
}
