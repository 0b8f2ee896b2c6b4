use crate::nets::ModelKind;

/// A downloadable pre-built model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModel {
    pub name: &'static str,
    pub description: &'static str,
    pub url: &'static str,
    pub filename: &'static str,
    /// Expected size, used for the disk-space preflight only
    pub size_mb: u64,
}

/// Ready-made CoreML models from Apple's public model gallery
pub const VENDOR_MODELS: &[RemoteModel] = &[
    RemoteModel {
        name: "mobilenetv2",
        description: "MobileNetV2 image classification, can be adapted for enhancement",
        url: "https://docs-assets.developer.apple.com/coreml/models/Image/ImageClassification/MobileNetV2/MobileNetV2.mlmodel",
        filename: "MobileNetV2.mlmodel",
        size_mb: 14,
    },
    RemoteModel {
        name: "resnet50",
        description: "ResNet50 image classification, feature extraction",
        url: "https://docs-assets.developer.apple.com/coreml/models/Image/ImageClassification/ResNet50/ResNet50.mlmodel",
        filename: "ResNet50.mlmodel",
        size_mb: 98,
    },
    RemoteModel {
        name: "squeezenet",
        description: "SqueezeNet image classification, lightweight",
        url: "https://docs-assets.developer.apple.com/coreml/models/Image/ImageClassification/SqueezeNet/SqueezeNet.mlmodel",
        filename: "SqueezeNet.mlmodel",
        size_mb: 5,
    },
];

/// Pre-trained colorizer weight files, pulled ahead of an artistic or
/// stable build. The weights are staged next to the bundles but never
/// loaded into the network.
pub const COLORIZER_WEIGHTS: &[RemoteModel] = &[
    RemoteModel {
        name: "artistic",
        description: "Artistic colorization with enhanced colors",
        url: "https://data.deepai.org/deoldify/ColorizeArtistic_gen.pth",
        filename: "deoldify_artistic.pth",
        size_mb: 243,
    },
    RemoteModel {
        name: "stable",
        description: "Stable colorization with realistic colors",
        url: "https://data.deepai.org/deoldify/ColorizeStable_gen.pth",
        filename: "deoldify_stable.pth",
        size_mb: 874,
    },
];

impl RemoteModel {
    /// Find a vendor model by name
    #[must_use]
    pub fn find(name: &str) -> Option<&'static Self> {
        VENDOR_MODELS.iter().find(|m| m.name == name)
    }

    /// All vendor model names
    #[must_use]
    pub fn all_names() -> Vec<&'static str> {
        VENDOR_MODELS.iter().map(|m| m.name).collect()
    }

    /// Weight file descriptor for a model kind, if it has one
    #[must_use]
    pub fn weights_for(kind: ModelKind) -> Option<&'static Self> {
        let name = match kind {
            ModelKind::Artistic => "artistic",
            ModelKind::Stable => "stable",
            _ => return None,
        };
        COLORIZER_WEIGHTS.iter().find(|m| m.name == name)
    }

    /// Closest vendor model name within two edits, for typo hints
    #[must_use]
    pub fn suggest(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return None;
        }
        VENDOR_MODELS
            .iter()
            .map(|m| (m.name, levenshtein(name, m.name)))
            .min_by_key(|(_, dist)| *dist)
            .filter(|(_, dist)| *dist <= 2)
            .map(|(model_name, _)| model_name)
    }
}

/// Levenshtein distance, two-row rolling variant
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}
