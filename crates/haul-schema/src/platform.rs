//! Host platforms and the identifiers each remote catalog uses for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The server flavour a dependency must run on.
///
/// `Auto` is a placeholder meaning "whatever the host is"; the resolver swaps
/// it for the configured platform before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    /// Whatever the host runs on.
    Auto,
    /// Folia, the regionised Paper fork.
    Folia,
    /// Paper.
    Paper,
    /// Spigot.
    Spigot,
    /// CraftBukkit and the plain Bukkit API.
    Bukkit,
    /// Purpur, a Paper fork.
    Purpur,
    /// Velocity proxy.
    Velocity,
    /// BungeeCord proxy.
    Bungeecord,
    /// Waterfall, a BungeeCord fork.
    Waterfall,
}

impl Platform {
    /// Every platform, `Auto` first.
    pub const ALL: [Platform; 9] = [
        Platform::Auto,
        Platform::Folia,
        Platform::Paper,
        Platform::Spigot,
        Platform::Bukkit,
        Platform::Purpur,
        Platform::Velocity,
        Platform::Bungeecord,
        Platform::Waterfall,
    ];

    /// Lower-case name used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Auto => "auto",
            Platform::Folia => "folia",
            Platform::Paper => "paper",
            Platform::Spigot => "spigot",
            Platform::Bukkit => "bukkit",
            Platform::Purpur => "purpur",
            Platform::Velocity => "velocity",
            Platform::Bungeecord => "bungeecord",
            Platform::Waterfall => "waterfall",
        }
    }

    /// Replace `Auto` with `fallback`.
    pub fn or(self, fallback: Platform) -> Platform {
        if self == Platform::Auto { fallback } else { self }
    }

    /// Platform key of the slug registry's download map.
    pub fn primary_id(&self) -> &'static str {
        match self {
            Platform::Velocity => "VELOCITY",
            Platform::Bungeecord | Platform::Waterfall => "WATERFALL",
            _ => "PAPER",
        }
    }

    /// Loaders accepted by the multi-file registry, most specific first.
    pub fn loaders(&self) -> &'static [&'static str] {
        match self {
            Platform::Folia => &["folia", "paper", "spigot", "bukkit"],
            Platform::Paper => &["paper", "spigot", "bukkit"],
            Platform::Purpur => &["purpur", "paper", "spigot", "bukkit"],
            Platform::Spigot => &["spigot", "bukkit"],
            Platform::Bukkit => &["bukkit"],
            Platform::Velocity => &["velocity"],
            Platform::Bungeecord => &["bungeecord"],
            Platform::Waterfall => &["waterfall", "bungeecord"],
            Platform::Auto => &["paper", "spigot", "bukkit", "purpur", "folia"],
        }
    }

    /// Filename fragments that mark a build made for this platform.
    pub fn preferred_markers(&self) -> &'static [&'static str] {
        match self {
            Platform::Folia => &["folia", "paper"],
            Platform::Purpur => &["purpur", "paper"],
            Platform::Paper => &["paper"],
            Platform::Spigot => &["spigot"],
            Platform::Bukkit => &["bukkit", "spigot"],
            Platform::Velocity => &["velocity"],
            Platform::Bungeecord => &["bungeecord", "bungee"],
            Platform::Waterfall => &["waterfall", "bungeecord", "bungee"],
            Platform::Auto => &[],
        }
    }

    /// Filename fragments that mark a build for some other platform.
    pub fn incompatible_markers(&self) -> &'static [&'static str] {
        match self {
            Platform::Spigot | Platform::Bukkit => &["paper", "folia", "purpur", "velocity", "bungee"],
            Platform::Paper => &["folia", "velocity", "bungee"],
            Platform::Folia => &["velocity", "bungee"],
            Platform::Purpur => &["folia", "velocity", "bungee"],
            Platform::Velocity => &["paper", "spigot", "bukkit", "folia", "bungee"],
            Platform::Bungeecord | Platform::Waterfall => {
                &["paper", "spigot", "bukkit", "folia", "velocity"]
            }
            Platform::Auto => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("Unknown platform: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_falls_back() {
        assert_eq!(Platform::Auto.or(Platform::Velocity), Platform::Velocity);
        assert_eq!(Platform::Folia.or(Platform::Paper), Platform::Folia);
    }

    #[test]
    fn test_primary_ids() {
        assert_eq!(Platform::Purpur.primary_id(), "PAPER");
        assert_eq!(Platform::Bungeecord.primary_id(), "WATERFALL");
        assert_eq!(Platform::Velocity.primary_id(), "VELOCITY");
    }

    #[test]
    fn test_parse_round_trip() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>(), Ok(p));
        }
        assert_eq!("PAPER".parse::<Platform>(), Ok(Platform::Paper));
        assert!("forge".parse::<Platform>().is_err());
    }
}
