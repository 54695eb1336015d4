//! Device-identity quirk resolution.
//!
//! Some sensor/driver families deliver chroma planes in swapped order or
//! misbehave above a certain capture resolution. Rather than scattering
//! string checks through the pipeline, known-defective families live in one
//! static rule table mapping device-identity predicates to a [`DeviceQuirk`]
//! value, resolved once per session start.

/// Hardware identity of the running device, as reported by the platform.
#[derive(Clone, Debug)]
pub struct DeviceProfile {
    pub manufacturer: String,
    pub model: String,
}

impl DeviceProfile {
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
        }
    }
}

/// Behavioral overrides applied for the resolved device family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceQuirk {
    /// Emit chroma samples in (plane-A, plane-B) order instead of the
    /// default (plane-B, plane-A).
    pub swap_chroma_order: bool,
    /// Cap the resolved capture size at (width, height), landscape-named.
    pub max_resolution: Option<(u32, u32)>,
}

struct QuirkRule {
    /// Case-insensitive substring of the manufacturer string.
    manufacturer_contains: &'static str,
    /// Case-insensitive substring of the model string.
    model_contains: &'static str,
    quirk: DeviceQuirk,
}

/// Known-defective device families. First match wins.
static QUIRK_TABLE: &[QuirkRule] = &[
    // Redmi-family sensors report chroma planes swapped and produce
    // artifacts above 720p.
    QuirkRule {
        manufacturer_contains: "xiaomi",
        model_contains: "redmi",
        quirk: DeviceQuirk {
            swap_chroma_order: true,
            max_resolution: Some((1280, 720)),
        },
    },
];

/// Resolve the quirk set for a device. Unknown devices get the default
/// (no overrides).
pub fn resolve_quirk(profile: &DeviceProfile) -> DeviceQuirk {
    let manufacturer = profile.manufacturer.to_lowercase();
    let model = profile.model.to_lowercase();
    for rule in QUIRK_TABLE {
        if manufacturer.contains(rule.manufacturer_contains) && model.contains(rule.model_contains)
        {
            log::debug!(
                "device quirk matched for {}/{}: {:?}",
                profile.manufacturer,
                profile.model,
                rule.quirk
            );
            return rule.quirk;
        }
    }
    DeviceQuirk::default()
}
