use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::screen::screen_model::{ScreenSnapshot, UiElement};

/// Number of image bytes sampled for the coarse signature.
const IMAGE_SAMPLES: usize = 1024;

/// Compact digest of a snapshot. Only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenFingerprint(pub String);

impl fmt::Display for ScreenFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough for logs
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

pub fn fingerprint(snapshot: &ScreenSnapshot) -> ScreenFingerprint {
    let mut hasher = Sha1::new();

    hasher.update(format!("{}x{}", snapshot.resolution.width, snapshot.resolution.height));

    for el in snapshot.tree.elements() {
        hasher.update(element_key(el).as_bytes());
        hasher.update(b"\n");
    }

    hasher.update(coarse_image_signature(&snapshot.image.bytes));

    ScreenFingerprint(format!("{:x}", hasher.finalize()))
}

fn element_key(el: &UiElement) -> String {
    let bounds = el
        .bounds
        .map(|b| format!("{},{},{},{}", b.left, b.top, b.right, b.bottom))
        .unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}",
        el.class, el.text, el.content_desc, el.resource_id, bounds
    )
}

/// Strided sample of the encoded image, quantised to drop low-order noise.
pub fn coarse_image_signature(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let step = (bytes.len() / IMAGE_SAMPLES).max(1);
    bytes.iter().step_by(step).map(|b| b >> 4).collect()
}
