//! The closed set of module keys an archive may carry.

use std::fmt;
use std::str::FromStr;

/// A named, independently exportable unit of user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleKey {
    Playlists,
    GlobalSettings,
    Favorites,
    Lyrics,
    SearchHistory,
    Transitions,
    EngagementStats,
    PlaybackHistory,
    QuickFill,
    Equalizer,
    ArtistImages,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 11] = [
        ModuleKey::Playlists,
        ModuleKey::GlobalSettings,
        ModuleKey::Favorites,
        ModuleKey::Lyrics,
        ModuleKey::SearchHistory,
        ModuleKey::Transitions,
        ModuleKey::EngagementStats,
        ModuleKey::PlaybackHistory,
        ModuleKey::QuickFill,
        ModuleKey::Equalizer,
        ModuleKey::ArtistImages,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Playlists => "playlists",
            Self::GlobalSettings => "global_settings",
            Self::Favorites => "favorites",
            Self::Lyrics => "lyrics",
            Self::SearchHistory => "search_history",
            Self::Transitions => "transitions",
            Self::EngagementStats => "engagement_stats",
            Self::PlaybackHistory => "playback_history",
            Self::QuickFill => "quick_fill",
            Self::Equalizer => "equalizer",
            Self::ArtistImages => "artist_images",
        }
    }

    /// Look up a key from its wire name. `None` for anything outside the closed set.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == key)
    }

    pub fn is_known(key: &str) -> bool {
        Self::parse(key).is_some()
    }

    /// Modules whose payload is a JSON object rather than an array of records.
    pub const fn is_object_shaped(&self) -> bool {
        matches!(self, Self::QuickFill | Self::Equalizer)
    }

    /// Modules whose records are `{key, type, value}` preference entries.
    pub const fn is_preference_shaped(&self) -> bool {
        matches!(
            self,
            Self::Playlists | Self::GlobalSettings | Self::QuickFill | Self::Equalizer
        )
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown module key '{}'", s))
    }
}
