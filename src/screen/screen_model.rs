use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Aspect-preserving downscale so that neither side exceeds `max_dimension`.
    /// Never upscales.
    pub fn fit_within(&self, max_dimension: u32) -> Resolution {
        let longest = self.width.max(self.height);
        if longest <= max_dimension || longest == 0 {
            return *self;
        }
        let ratio = max_dimension as f64 / longest as f64;
        Resolution {
            width: ((self.width as f64 * ratio).round() as u32).max(1),
            height: ((self.height as f64 * ratio).round() as u32).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// One node of the structural tree (a uiautomator `<node>`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiElement {
    pub class: String,
    pub text: String,
    pub content_desc: String,
    pub resource_id: String,
    pub bounds: Option<Bounds>,
    pub clickable: bool,
    pub scrollable: bool,
    pub focusable: bool,
    pub enabled: bool,
    pub children: Vec<UiElement>,
}

impl UiElement {
    pub fn is_input(&self) -> bool {
        let class = self.class.to_lowercase();
        class.contains("edittext") || class.contains("autocompletetextview")
    }

    pub fn is_interactable(&self) -> bool {
        self.enabled && (self.clickable || self.is_input())
    }

    /// Text, description and resource id joined and lowercased.
    pub fn searchable_text(&self) -> String {
        format!("{} {} {}", self.text, self.content_desc, self.resource_id).to_lowercase()
    }

    /// Human-facing label: visible text, then description, then id.
    pub fn label(&self) -> Option<&str> {
        [&self.text, &self.content_desc, &self.resource_id]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// Ordered forest of structural elements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuralTree {
    pub roots: Vec<UiElement>,
}

impl StructuralTree {
    pub fn new(roots: Vec<UiElement>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first, document order.
    pub fn elements(&self) -> Vec<&UiElement> {
        fn walk<'a>(node: &'a UiElement, out: &mut Vec<&'a UiElement>) {
            out.push(node);
            for child in &node.children {
                walk(child, out);
            }
        }

        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.elements()
            .iter()
            .any(|el| el.searchable_text().contains(&needle))
    }
}

/// Where the screenshot for a snapshot lives.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: Option<PathBuf>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageRef {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { path: None, bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.path.is_none()
    }
}

/// Immutable capture of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSnapshot {
    pub image: ImageRef,
    pub tree: StructuralTree,
    pub resolution: Resolution,
}
