//! Device and network profiling
//!
//! A pure function of whatever ambient signals the host can read. Every
//! signal is optional; a missing viewport or touch flag never classifies a
//! device as mobile on its own.

use serde::{Deserialize, Serialize};

const MOBILE_UA_TOKENS: &[&str] = &[
    "android", "webos", "iphone", "ipad", "ipod", "blackberry", "iemobile", "opera mini",
];
const TABLET_UA_TOKENS: &[&str] = &["ipad", "tablet"];

const SMALL_SCREEN_MAX: u32 = 768;
const MEDIUM_SCREEN_MAX: u32 = 1024;

/// Raw signals read from the host environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSignals {
    pub viewport_width: Option<u32>,
    pub touch_capable: Option<bool>,
    pub user_agent: Option<String>,
    /// Network-information hint such as `4g` or `slow-2g`
    pub effective_connection: Option<String>,
}

/// Device classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

/// Media tier used to pick among source variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTier {
    Mobile,
    Desktop,
}

impl std::fmt::Display for MediaTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaTier::Mobile => write!(f, "mobile"),
            MediaTier::Desktop => write!(f, "desktop"),
        }
    }
}

impl std::str::FromStr for MediaTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mobile" => Ok(MediaTier::Mobile),
            "desktop" => Ok(MediaTier::Desktop),
            other => Err(format!("unknown media tier: {other}")),
        }
    }
}

/// Network speed class from the effective-connection hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionClass {
    Slow2g,
    Cellular2g,
    Cellular3g,
    Cellular4g,
    Unknown,
}

impl ConnectionClass {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => ConnectionClass::Slow2g,
            "2g" => ConnectionClass::Cellular2g,
            "3g" => ConnectionClass::Cellular3g,
            "4g" => ConnectionClass::Cellular4g,
            _ => ConnectionClass::Unknown,
        }
    }
}

/// Classification derived from [`DeviceSignals`]
#[derive(Debug, Clone, Default)]
pub struct DeviceProfile {
    signals: DeviceSignals,
}

impl DeviceProfile {
    pub fn from_signals(signals: DeviceSignals) -> Self {
        Self { signals }
    }

    /// Profile of a desktop browser with no network hint
    pub fn desktop() -> Self {
        Self::from_signals(DeviceSignals {
            viewport_width: Some(1440),
            touch_capable: Some(false),
            user_agent: None,
            effective_connection: None,
        })
    }

    /// Profile of a touch phone
    pub fn mobile() -> Self {
        Self::from_signals(DeviceSignals {
            viewport_width: Some(390),
            touch_capable: Some(true),
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into()),
            effective_connection: None,
        })
    }

    pub fn signals(&self) -> &DeviceSignals {
        &self.signals
    }

    fn ua_has(&self, tokens: &[&str]) -> bool {
        self.signals
            .user_agent
            .as_deref()
            .map(|ua| {
                let ua = ua.to_ascii_lowercase();
                tokens.iter().any(|t| ua.contains(t))
            })
            .unwrap_or(false)
    }

    fn touch(&self) -> bool {
        self.signals.touch_capable.unwrap_or(false)
    }

    fn width_in(&self, range: std::ops::RangeInclusive<u32>) -> bool {
        self.signals.viewport_width.is_some_and(|w| range.contains(&w))
    }

    fn is_mobile(&self) -> bool {
        let small = self.width_in(0..=SMALL_SCREEN_MAX);
        let large_tablet = self.ua_has(TABLET_UA_TOKENS)
            && self.signals.viewport_width.is_some_and(|w| w > SMALL_SCREEN_MAX);
        (self.ua_has(MOBILE_UA_TOKENS) || small) && self.touch() && !large_tablet
    }

    fn is_tablet(&self) -> bool {
        self.ua_has(TABLET_UA_TOKENS)
            || (self.width_in(SMALL_SCREEN_MAX + 1..=MEDIUM_SCREEN_MAX) && self.touch())
    }

    pub fn classify_device(&self) -> DeviceClass {
        if self.is_mobile() {
            DeviceClass::Mobile
        } else if self.is_tablet() {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    /// Tablets share the mobile tier to conserve bandwidth
    pub fn preferred_tier(&self) -> MediaTier {
        match self.classify_device() {
            DeviceClass::Desktop => MediaTier::Desktop,
            DeviceClass::Mobile | DeviceClass::Tablet => MediaTier::Mobile,
        }
    }

    pub fn connection_class(&self) -> ConnectionClass {
        self.signals
            .effective_connection
            .as_deref()
            .map(ConnectionClass::parse)
            .unwrap_or(ConnectionClass::Unknown)
    }

    /// Unknown connections count as good on desktop only
    pub fn should_prefer_high_quality(&self) -> bool {
        self.classify_device() == DeviceClass::Desktop
            && matches!(
                self.connection_class(),
                ConnectionClass::Cellular4g | ConnectionClass::Unknown
            )
    }

    /// Parallel thumbnail loads allowed for this device
    pub fn max_concurrent_preloads(&self) -> usize {
        match self.preferred_tier() {
            MediaTier::Mobile => 2,
            MediaTier::Desktop => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(width: Option<u32>, touch: Option<bool>, ua: Option<&str>) -> DeviceProfile {
        DeviceProfile::from_signals(DeviceSignals {
            viewport_width: width,
            touch_capable: touch,
            user_agent: ua.map(String::from),
            effective_connection: None,
        })
    }

    #[test]
    fn test_phone_is_mobile() {
        let p = DeviceProfile::mobile();
        assert_eq!(p.classify_device(), DeviceClass::Mobile);
        assert_eq!(p.preferred_tier(), MediaTier::Mobile);
        assert!(!p.should_prefer_high_quality());
    }

    #[test]
    fn test_tablet_maps_to_mobile_tier() {
        let p = profile(Some(1024), Some(true), Some("Mozilla/5.0 (iPad; CPU OS 17_0)"));
        assert_eq!(p.classify_device(), DeviceClass::Tablet);
        assert_eq!(p.preferred_tier(), MediaTier::Mobile);

        let touch_laptop = profile(Some(900), Some(true), None);
        assert_eq!(touch_laptop.classify_device(), DeviceClass::Tablet);
    }

    #[test]
    fn test_small_window_without_touch_is_desktop() {
        let p = profile(Some(600), Some(false), None);
        assert_eq!(p.classify_device(), DeviceClass::Desktop);
    }

    #[test]
    fn test_missing_signals_default_to_desktop() {
        let p = profile(None, None, None);
        assert_eq!(p.classify_device(), DeviceClass::Desktop);
        assert_eq!(p.connection_class(), ConnectionClass::Unknown);
        assert!(p.should_prefer_high_quality());
    }

    #[test]
    fn test_slow_connection_disables_high_quality() {
        let mut signals = DeviceProfile::desktop().signals().clone();
        signals.effective_connection = Some("3g".into());
        let p = DeviceProfile::from_signals(signals);
        assert_eq!(p.connection_class(), ConnectionClass::Cellular3g);
        assert!(!p.should_prefer_high_quality());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Mobile".parse::<MediaTier>().unwrap(), MediaTier::Mobile);
        assert!("watch".parse::<MediaTier>().is_err());
    }
}
