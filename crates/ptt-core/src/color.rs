//! Tag color palette.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed tag palette (Catppuccin Frappé accents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    Rosewater,
    Flamingo,
    Pink,
    Mauve,
    Red,
    Maroon,
    Peach,
    Yellow,
    Green,
    Teal,
    Sky,
    Sapphire,
    #[default]
    Blue,
    Lavender,
}

impl Color {
    /// Every palette member, in display order.
    pub const ALL: [Self; 14] = [
        Self::Rosewater,
        Self::Flamingo,
        Self::Pink,
        Self::Mauve,
        Self::Red,
        Self::Maroon,
        Self::Peach,
        Self::Yellow,
        Self::Green,
        Self::Teal,
        Self::Sky,
        Self::Sapphire,
        Self::Blue,
        Self::Lavender,
    ];

    /// Lowercase name used in outlines and storage.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rosewater => "rosewater",
            Self::Flamingo => "flamingo",
            Self::Pink => "pink",
            Self::Mauve => "mauve",
            Self::Red => "red",
            Self::Maroon => "maroon",
            Self::Peach => "peach",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Teal => "teal",
            Self::Sky => "sky",
            Self::Sapphire => "sapphire",
            Self::Blue => "blue",
            Self::Lavender => "lavender",
        }
    }

    /// Hex RGB triple, e.g. `#8CAAEE`.
    #[must_use]
    pub const fn hex(self) -> &'static str {
        match self {
            Self::Rosewater => "#F2D5CF",
            Self::Flamingo => "#EEBEBE",
            Self::Pink => "#F4B8E4",
            Self::Mauve => "#CA9EE6",
            Self::Red => "#E78284",
            Self::Maroon => "#EA999C",
            Self::Peach => "#EF9F76",
            Self::Yellow => "#E5C890",
            Self::Green => "#A6D189",
            Self::Teal => "#81C8BE",
            Self::Sky => "#99D1DB",
            Self::Sapphire => "#85C1DC",
            Self::Blue => "#8CAAEE",
            Self::Lavender => "#BABBF1",
        }
    }

    /// Parses a color, falling back to the default palette member.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|err| {
            tracing::debug!(%err, "using default color");
            Self::default()
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = UnknownColor;

    /// Accepts a palette name or its hex triple, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|color| {
                color.name().eq_ignore_ascii_case(needle) || color.hex().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error for color strings outside the palette.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color: {0}")]
pub struct UnknownColor(pub String);
