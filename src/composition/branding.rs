//! Text burned onto standalone Shorts.

use crate::{
    config::Config,
    video::{
        filters::{TextOverlay, TextPlacement},
        types::format_handle,
    },
};

/// Credit shown when a clip has no known author
pub const UNKNOWN_CREATOR: &str = "@creator";

/// Creator credit at the top plus the call-to-action banner.
///
/// Empty when branding is off.
pub fn branding_overlays(credit: Option<&str>, config: &Config) -> Vec<TextOverlay> {
    if !config.shorts.branding {
        return Vec::new();
    }

    let height = config.output.height;
    let ratio = config.assets.attribution_font_ratio;

    let handle = credit
        .and_then(format_handle)
        .unwrap_or_else(|| UNKNOWN_CREATOR.to_string());
    let mut overlays = vec![TextOverlay::new(handle, height, ratio, TextPlacement::Top).unboxed()];

    let banner = config
        .shorts
        .call_to_action
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(text) = banner {
        overlays.push(TextOverlay::new(text, height, ratio, TextPlacement::Banner));
    }

    overlays
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(overlays: &[TextOverlay]) -> Vec<&str> {
        overlays.iter().map(|o| o.text.as_str()).collect()
    }

    #[test]
    fn test_credit_and_banner() {
        let config = Config::default();
        let overlays = branding_overlays(Some("skater"), &config);

        assert_eq!(texts(&overlays), vec!["@skater", "WATCH FULL VIDEO ON YOUTUBE"]);
        assert_eq!(overlays[0].placement, TextPlacement::Top);
        assert_eq!(overlays[1].placement, TextPlacement::Banner);
        assert_eq!(overlays[0].font_size, 67);
    }

    #[test]
    fn test_missing_author_gets_placeholder() {
        let mut config = Config::default();
        config.shorts.call_to_action = Some("  ".to_string());

        let overlays = branding_overlays(None, &config);
        assert_eq!(texts(&overlays), vec![UNKNOWN_CREATOR]);

        let overlays = branding_overlays(Some("#tag"), &config);
        assert_eq!(texts(&overlays), vec!["#tag"]);
    }

    #[test]
    fn test_branding_off() {
        let mut config = Config::default();
        config.shorts.branding = false;
        assert!(branding_overlays(Some("skater"), &config).is_empty());
    }
}
