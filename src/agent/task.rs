use serde::{Deserialize, Serialize};

/// Apps recognised by name in a task instruction, with their Android packages.
const KNOWN_APPS: &[(&str, &str)] = &[
    ("flipkart", "com.flipkart.android"),
    ("amazon", "in.amazon.mShop.android.shopping"),
    ("blinkit", "com.grofers.customerapp"),
    ("zomato", "com.application.zomato"),
    ("ola", "com.olacabs.customer"),
];

/// Phrases that introduce the thing the user wants to search for.
const QUERY_MARKERS: &[&str] = &["search for ", "look for ", "find ", "search "];

/// Trailing phrases that describe where to search, not what.
const QUERY_STOPWORDS: &[&str] = &[" on ", " in the ", " using ", " via "];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTarget {
    pub identifier: String,
    pub package: String,
}

impl AppTarget {
    /// Resolve an identifier; unknown identifiers are taken as package names.
    pub fn resolve(identifier: &str) -> Self {
        let id = identifier.trim().to_lowercase();
        let package = KNOWN_APPS
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, pkg)| pkg.to_string())
            .unwrap_or_else(|| identifier.trim().to_string());

        Self {
            identifier: id,
            package,
        }
    }

    /// Find a known app mentioned in free text.
    pub fn detect(instruction: &str) -> Option<Self> {
        let text = instruction.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        KNOWN_APPS
            .iter()
            .find(|(name, _)| words.contains(name))
            .map(|(name, pkg)| AppTarget {
                identifier: name.to_string(),
                package: pkg.to_string(),
            })
    }
}

/// The goal of one run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub instruction: String,
    pub app: Option<AppTarget>,
}

impl Task {
    /// Build a task; when `app` is `None` the target is detected from the
    /// instruction.
    pub fn new(instruction: &str, app: Option<&str>) -> Self {
        let app = match app {
            Some(id) if !id.trim().is_empty() => Some(AppTarget::resolve(id)),
            _ => AppTarget::detect(instruction),
        };

        Self {
            instruction: instruction.trim().to_string(),
            app,
        }
    }

    /// The search query implied by the instruction, if any.
    pub fn query_text(&self) -> Option<String> {
        let lower = self.instruction.to_lowercase();

        // earliest marker wins; at the same position the longer one does
        let (pos, len) = QUERY_MARKERS
            .iter()
            .filter_map(|m| lower.find(m).map(|i| (i, m.len())))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))?;

        let mut query = &lower[pos + len..];

        // drop clause separators and anything after them
        if let Some(end) = query.find([',', '.', ';']) {
            query = &query[..end];
        }
        for stop in QUERY_STOPWORDS {
            if let Some(end) = query.find(stop) {
                query = &query[..end];
            }
        }

        let app_name = self.app.as_ref().map(|a| a.identifier.as_str());
        let cleaned: Vec<&str> = query
            .split_whitespace()
            .filter(|w| Some(*w) != app_name)
            .collect();

        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.join(" "))
        }
    }
}
