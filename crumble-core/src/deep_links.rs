//! External player deep links

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

/// Characters left as-is by URI component encoding
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// A player launch URL with an alternative scheme to try
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerLink {
    pub name: &'static str,
    pub scheme: String,
    pub fallback: String,
}

/// Launch links for every supported external player, in preference order
#[must_use]
pub fn player_links(stream_url: &str, title: Option<&str>) -> Vec<PlayerLink> {
    let url = encode(stream_url);
    let title = title.map(encode).unwrap_or_default();

    vec![
        PlayerLink {
            name: "VLC",
            scheme: format!("vlc://{url}"),
            fallback: format!("vlc-x-callback://x-callback-url/stream?url={url}&filename={title}"),
        },
        PlayerLink {
            name: "Infuse",
            scheme: format!("infuse://x-callback-url/play?url={url}"),
            fallback: format!("infusepro://x-callback-url/play?url={url}"),
        },
        PlayerLink {
            name: "MX Player",
            scheme: mx_intent(stream_url, "com.mxtech.videoplayer.ad", &title),
            fallback: mx_intent(stream_url, "com.mxtech.videoplayer.pro", &title),
        },
    ]
}

// Android intents carry the raw URL
fn mx_intent(stream_url: &str, package: &str, title: &str) -> String {
    format!("intent://{stream_url}#Intent;package={package};S.title={title};end")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Other,
}

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a user-agent string
#[must_use]
pub fn detect_platform(user_agent: &str) -> Platform {
    if ["iPad", "iPhone", "iPod"].iter().any(|d| user_agent.contains(d)) {
        Platform::Ios
    } else if user_agent.to_ascii_lowercase().contains("android") {
        Platform::Android
    } else {
        Platform::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecommendedPlayer {
    pub name: &'static str,
    pub url: &'static str,
}

const IOS_PLAYERS: &[RecommendedPlayer] = &[
    RecommendedPlayer {
        name: "Infuse 7",
        url: "https://apps.apple.com/app/infuse-7/id1136220934",
    },
    RecommendedPlayer {
        name: "VLC",
        url: "https://apps.apple.com/app/vlc-media-player/id650377962",
    },
    RecommendedPlayer {
        name: "PlayerXtreme",
        url: "https://apps.apple.com/app/playerxtreme-media-player/id456584471",
    },
];

const ANDROID_PLAYERS: &[RecommendedPlayer] = &[
    RecommendedPlayer {
        name: "VLC",
        url: "https://play.google.com/store/apps/details?id=org.videolan.vlc",
    },
    RecommendedPlayer {
        name: "MX Player",
        url: "https://play.google.com/store/apps/details?id=com.mxtech.videoplayer.ad",
    },
    RecommendedPlayer {
        name: "Just Player",
        url: "https://play.google.com/store/apps/details?id=com.brouken.player",
    },
];

const DESKTOP_PLAYERS: &[RecommendedPlayer] = &[
    RecommendedPlayer {
        name: "VLC",
        url: "https://www.videolan.org/vlc/",
    },
    RecommendedPlayer {
        name: "MPV",
        url: "https://mpv.io/",
    },
    RecommendedPlayer {
        name: "PotPlayer",
        url: "https://potplayer.daum.net/",
    },
];

#[must_use]
pub const fn recommended_players(platform: Platform) -> &'static [RecommendedPlayer] {
    match platform {
        Platform::Ios => IOS_PLAYERS,
        Platform::Android => ANDROID_PLAYERS,
        Platform::Other => DESKTOP_PLAYERS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_links_encoding() {
        let links = player_links("http://host/a b.mp4?x=1&y=2", Some("Big Buck Bunny"));
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].scheme, "vlc://http%3A%2F%2Fhost%2Fa%20b.mp4%3Fx%3D1%26y%3D2");
        assert!(links[0].fallback.ends_with("&filename=Big%20Buck%20Bunny"));
        assert_eq!(
            links[1].fallback,
            "infusepro://x-callback-url/play?url=http%3A%2F%2Fhost%2Fa%20b.mp4%3Fx%3D1%26y%3D2"
        );
        assert_eq!(
            links[2].scheme,
            "intent://http://host/a b.mp4?x=1&y=2#Intent;package=com.mxtech.videoplayer.ad;S.title=Big%20Buck%20Bunny;end"
        );
        assert!(links[2].fallback.contains("com.mxtech.videoplayer.pro"));
    }

    #[test]
    fn test_missing_title_is_empty() {
        let links = player_links("http://h/v.mkv", None);
        assert!(links[0].fallback.ends_with("&filename="));
        assert!(links[2].scheme.ends_with(";S.title=;end"));
    }

    #[test]
    fn test_unreserved_characters_kept() {
        assert_eq!(encode("a-b_c.d!e~f*g'h(i)"), "a-b_c.d!e~f*g'h(i)");
    }

    #[test]
    fn test_detect_platform() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8)";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64)";
        assert_eq!(detect_platform(iphone), Platform::Ios);
        assert_eq!(detect_platform("Mozilla/5.0 (iPad; CPU OS 16_0)"), Platform::Ios);
        assert_eq!(detect_platform(android), Platform::Android);
        assert_eq!(detect_platform(desktop), Platform::Other);
    }

    #[test]
    fn test_recommended_players() {
        let names: Vec<_> = recommended_players(Platform::Android)
            .iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["VLC", "MX Player", "Just Player"]);
        assert_eq!(recommended_players(Platform::Ios)[0].name, "Infuse 7");
        assert_eq!(recommended_players(Platform::Other)[1].url, "https://mpv.io/");
    }
}
