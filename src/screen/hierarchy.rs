use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::screen::screen_model::{Bounds, StructuralTree, UiElement};

static NODE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)node\b((?:[^>"]|"[^"]*")*?)(/?)>"#).expect("static regex")
});

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("static regex"));

static BOUNDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("static regex")
});

/// Parse a uiautomator XML dump into a structural forest.
///
/// Unbalanced or truncated dumps are tolerated: any nodes still open at the
/// end are closed implicitly, and stray closing tags are ignored.
pub fn parse_hierarchy(xml: &str) -> StructuralTree {
    let mut stack: Vec<UiElement> = Vec::new();
    let mut roots: Vec<UiElement> = Vec::new();

    for caps in NODE_TAG.captures_iter(xml) {
        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();

        if closing {
            if let Some(done) = stack.pop() {
                attach(done, &mut stack, &mut roots);
            }
            continue;
        }

        let element = element_from_attributes(&caps[2]);
        if self_closing {
            attach(element, &mut stack, &mut roots);
        } else {
            stack.push(element);
        }
    }

    while let Some(done) = stack.pop() {
        attach(done, &mut stack, &mut roots);
    }

    StructuralTree::new(roots)
}

fn attach(element: UiElement, stack: &mut [UiElement], roots: &mut Vec<UiElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

fn element_from_attributes(raw: &str) -> UiElement {
    let attrs: HashMap<&str, String> = ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|c| {
            let key = c.get(1)?.as_str();
            let value = c.get(2)?.as_str();
            Some((key, decode_entities(value)))
        })
        .collect();

    let text = |key: &str| attrs.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
    let flag = |key: &str| attrs.get(key).is_some_and(|v| v == "true");

    UiElement {
        class: text("class"),
        text: text("text"),
        content_desc: text("content-desc"),
        resource_id: text("resource-id"),
        bounds: attrs.get("bounds").and_then(|b| parse_bounds(b)),
        clickable: flag("clickable"),
        scrollable: flag("scrollable"),
        focusable: flag("focusable"),
        // uiautomator omits `enabled` on some builds; absent means enabled
        enabled: attrs.get("enabled").is_none_or(|v| v == "true"),
        children: Vec::new(),
    }
}

/// Parse `[l,t][r,b]`.
pub fn parse_bounds(raw: &str) -> Option<Bounds> {
    let caps = BOUNDS.captures(raw)?;
    let n = |i: usize| caps[i].parse::<i32>().ok();
    Some(Bounds::new(n(1)?, n(2)?, n(3)?, n(4)?))
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}
