use mobile_agent::screen::screen_model::{
    Bounds, ImageRef, Resolution, ScreenSnapshot, StructuralTree, UiElement,
};

/// Device resolution used across tests. Fits to 512x1024 in the reference
/// frame, so reference coordinates double exactly.
pub const WIDTH: u32 = 1024;
pub const HEIGHT: u32 = 2048;

pub fn resolution() -> Resolution {
    Resolution::new(WIDTH, HEIGHT)
}

pub fn element(class: &str, text: &str, bounds: Bounds) -> UiElement {
    UiElement {
        class: class.to_string(),
        text: text.to_string(),
        bounds: Some(bounds),
        clickable: true,
        enabled: true,
        ..Default::default()
    }
}

pub fn label(text: &str) -> UiElement {
    UiElement {
        class: "android.widget.TextView".to_string(),
        text: text.to_string(),
        bounds: Some(Bounds::new(0, 1000, 1024, 1100)),
        clickable: false,
        enabled: true,
        ..Default::default()
    }
}

pub fn snapshot(roots: Vec<UiElement>) -> ScreenSnapshot {
    ScreenSnapshot {
        image: ImageRef::default(),
        tree: StructuralTree::new(roots),
        resolution: resolution(),
    }
}

/// Screen with nothing interactable on it.
pub fn blank() -> ScreenSnapshot {
    snapshot(vec![label("nothing to see")])
}

/// Distinct, non-interactable screens; fingerprints differ for every `i`.
pub fn numbered(i: usize) -> ScreenSnapshot {
    snapshot(vec![label(&format!("page {}", i))])
}

/// App home with a search field near the top and a cart button below.
pub fn search_home() -> ScreenSnapshot {
    let mut search = element(
        "android.widget.EditText",
        "Search for products",
        Bounds::new(40, 120, 984, 220),
    );
    search.resource_id = "com.example:id/search_box".to_string();

    snapshot(vec![
        search,
        element("android.widget.Button", "Cart", Bounds::new(800, 1900, 1000, 2000)),
    ])
}

/// Listing screen carrying a result marker.
pub fn results() -> ScreenSnapshot {
    snapshot(vec![
        label("Showing 1-24 of 3,000 results"),
        element("android.widget.Button", "Sort By", Bounds::new(0, 300, 500, 380)),
    ])
}
