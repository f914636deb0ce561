use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// Option sets published for the Wan 2.5 preview endpoints.
pub const ASPECT_RATIOS: [&str; 3] = ["16:9", "9:16", "1:1"];
pub const RESOLUTIONS: [&str; 3] = ["1080p", "720p", "480p"];
pub const DURATIONS: [&str; 2] = ["5", "10"];
pub const FRAME_SIZES: [&str; 4] = [
    "1280x720 (16:9)",
    "1920x1080 (16:9)",
    "720x1280 (9:16)",
    "960x960 (1:1)",
];

/// Prefill for the negative-prompt field; the builder never injects it.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, blurry, watermark, text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeKind {
    TextToVideo,
    ImageToVideo,
    TextToImage,
    ImageToImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Video,
    Image,
}

impl OutputKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    AspectRatio,
    Resolution,
    Duration,
    PromptExpansion,
    AudioUrl,
    FrameDims,
    Strength,
    // The resolved image_url is merged after staging, not by the builder.
    ImageSlot,
}

impl ModeKind {
    pub fn field_rules(self) -> &'static [FieldRule] {
        match self {
            Self::TextToVideo => &[
                FieldRule::AspectRatio,
                FieldRule::Resolution,
                FieldRule::Duration,
                FieldRule::PromptExpansion,
                FieldRule::AudioUrl,
            ],
            Self::ImageToVideo => &[FieldRule::FrameDims, FieldRule::ImageSlot],
            Self::TextToImage => &[],
            Self::ImageToImage => &[FieldRule::Strength, FieldRule::ImageSlot],
        }
    }

    pub fn requires_image(self) -> bool {
        self.field_rules().contains(&FieldRule::ImageSlot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSpec {
    pub name: String,
    pub model_id: String,
    pub kind: ModeKind,
    pub output: OutputKind,
}

impl ModeSpec {
    pub fn field_rules(&self) -> &'static [FieldRule] {
        self.kind.field_rules()
    }

    pub fn requires_image(&self) -> bool {
        self.kind.requires_image()
    }
}

#[derive(Debug, Clone)]
pub struct ModeCatalog {
    modes: IndexMap<String, ModeSpec>,
}

impl ModeCatalog {
    pub fn new(modes: Option<IndexMap<String, ModeSpec>>) -> Self {
        Self {
            modes: modes.unwrap_or_else(default_modes),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModeSpec> {
        self.modes.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModeSpec> {
        self.modes.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modes.keys().map(String::as_str).collect()
    }

    pub fn by_output(&self, output: OutputKind) -> Vec<ModeSpec> {
        self.modes
            .values()
            .filter(|mode| mode.output == output)
            .cloned()
            .collect()
    }
}

impl Default for ModeCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_modes() -> IndexMap<String, ModeSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, model_id: &str, kind: ModeKind, output: OutputKind| {
        map.insert(
            name.to_string(),
            ModeSpec {
                name: name.to_string(),
                model_id: model_id.to_string(),
                kind,
                output,
            },
        );
    };

    insert(
        "text-to-video",
        "fal-ai/wan-25-preview/text-to-video",
        ModeKind::TextToVideo,
        OutputKind::Video,
    );
    insert(
        "image-to-video",
        "fal-ai/wan-25-preview/image-to-video",
        ModeKind::ImageToVideo,
        OutputKind::Video,
    );
    insert(
        "text-to-image",
        "fal-ai/wan-25-preview/text-to-image",
        ModeKind::TextToImage,
        OutputKind::Image,
    );
    insert(
        "image-to-image",
        "fal-ai/wan-25-preview/image-to-image",
        ModeKind::ImageToImage,
        OutputKind::Image,
    );

    map
}

pub fn orientation_label(aspect_ratio: &str) -> Option<&'static str> {
    let (width, height) = aspect_ratio.split_once(':')?;
    let width: u32 = width.trim().parse().ok()?;
    let height: u32 = height.trim().parse().ok()?;
    if width > height {
        Some("Landscape")
    } else if height > width {
        Some("Portrait")
    } else {
        Some("Square")
    }
}
