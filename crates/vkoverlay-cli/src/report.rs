use std::fmt::Write;

use vkoverlay_core::config::Corner;
use vkoverlay_core::LayerConfig;

/// Human-readable summary of the settings the layer would run with.
pub fn summarize(config: &LayerConfig) -> String {
    let overlay = &config.overlay;
    let mut out = String::new();

    let _ = writeln!(out, "overlay:      {}", if overlay.enabled { "enabled" } else { "disabled" });
    let _ = writeln!(out, "corner:       {}", corner_name(overlay.corner));
    let _ = writeln!(out, "margin:       {}px", overlay.margin);
    let _ = writeln!(out, "badge:        {}x{}px", overlay.width, overlay.height);
    let [r, g, b, a] = overlay.color;
    let _ = writeln!(out, "color:        [{r:.2}, {g:.2}, {b:.2}, {a:.2}]");
    let _ = writeln!(out, "frame meter:  {}", if overlay.frame_meter { "on" } else { "off" });
    let _ = writeln!(out, "log filter:   {}", config.logging.filter);

    for warning in warnings(config) {
        let _ = writeln!(out, "warning:      {warning}");
    }
    out
}

/// Settings that parse but will not produce a visible overlay.
pub fn warnings(config: &LayerConfig) -> Vec<String> {
    let overlay = &config.overlay;
    let mut found = Vec::new();
    if overlay.width == 0 || overlay.height == 0 {
        found.push("badge has zero area and is never drawn".to_string());
    }
    if overlay.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
        found.push("color components outside 0.0..=1.0 may be clamped by the driver".to_string());
    }
    found
}

fn corner_name(corner: Corner) -> &'static str {
    match corner {
        Corner::TopLeft => "top-left",
        Corner::TopRight => "top-right",
        Corner::BottomLeft => "bottom-left",
        Corner::BottomRight => "bottom-right",
    }
}
