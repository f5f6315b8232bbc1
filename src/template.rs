//! Source preamble and `%NAME%` template variables.
//!
//! Layout functions written by the user reference theme values such as
//! `%THEMECOLOR%` or `%LINEWIDTH%`. Before a compile the preamble is
//! prepended and every known variable is substituted.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::CompileSettings;

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%([A-Z]+)%").unwrap());

static RGB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rgba?\((\d+),\s*(\d+),\s*(\d+)(?:,\s*[\d.]+)?\)").unwrap()
});

static HSL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"hsla?\((\d+),\s*(\d+)%,\s*(\d+)%(?:,\s*[\d.]+)?\)").unwrap()
});

/// Variables and their fallback values.
const DEFAULTS: &[(&str, &str)] = &[
    ("THEMECOLOR", "ffffff"),
    ("FONTSIZE", "16pt"),
    ("BGCOLOR", "ffffff"),
    ("FONTTEXT", "sans-serif"),
    ("FONTMONOSPACE", "monospace"),
    ("LINEWIDTH", "525pt"),
    ("ACCENTCOLOR", "ffffff"),
    ("FAINTCOLOR", "888888"),
    ("MUTEDCOLOR", "999999"),
    ("BGPRIMARY", "ffffff"),
    ("BGPRIMARYALT", "f5f5f5"),
    ("BGSECONDARY", "f0f0f0"),
    ("BGSECONDARYALT", "e8e8e8"),
    ("SUCCESSCOLOR", "00ff00"),
    ("WARNINGCOLOR", "ffaa00"),
    ("ERRORCOLOR", "ff0000"),
    ("HEADINGCOLOR", "ffffff"),
];

/// Values substituted for `%NAME%` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariables {
    values: BTreeMap<String, String>,
}

impl Default for TemplateVariables {
    fn default() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl TemplateVariables {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Set a colour variable from a CSS colour. Unparseable colours keep the
    /// current value and return `false`.
    pub fn set_color(&mut self, name: &str, css: &str) -> bool {
        match css_color_to_hex(css) {
            Some(hex) => {
                self.set(name, hex);
                true
            }
            None => false,
        }
    }

    /// Set `FONTSIZE` from a CSS pixel size.
    pub fn set_font_size_px(&mut self, px: f32) {
        self.set("FONTSIZE", format!("{}pt", px * 0.75));
    }

    /// Set `LINEWIDTH` from a CSS pixel width.
    pub fn set_line_width_px(&mut self, px: f32) {
        self.set("LINEWIDTH", format!("{}pt", px / 1.5));
    }

    /// Substitute every known `%NAME%`. Unknown placeholders are left alone.
    pub fn apply(&self, source: &str) -> String {
        VARIABLE_PATTERN
            .replace_all(source, |caps: &regex::Captures<'_>| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Build the source handed to the compiler.
pub fn prepare_source(source: &str, settings: &CompileSettings, vars: &TemplateVariables) -> String {
    if settings.use_layout_functions {
        vars.apply(&format!("{}\n{}", settings.layout_functions, source))
    } else {
        vars.apply(source)
    }
}

/// Convert `#rrggbb`, `rgb()`/`rgba()` or `hsl()`/`hsla()` to bare hex.
pub fn css_color_to_hex(color: &str) -> Option<String> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        return Some(hex.to_string());
    }

    if let Some(caps) = RGB_PATTERN.captures(color) {
        let channel = |i: usize| caps[i].parse::<u32>().ok().map(|v| v.min(255) as u8);
        return Some(hex_triplet(channel(1)?, channel(2)?, channel(3)?));
    }

    if let Some(caps) = HSL_PATTERN.captures(color) {
        let h = caps[1].parse::<f64>().ok()? / 360.0;
        let s = caps[2].parse::<f64>().ok()? / 100.0;
        let l = caps[3].parse::<f64>().ok()? / 100.0;
        let (r, g, b) = hsl_to_rgb(h, s, l);
        return Some(hex_triplet(r, g, b));
    }

    None
}

fn hex_triplet(r: u8, g: u8, b: u8) -> String {
    format!("{r:02x}{g:02x}{b:02x}")
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let to_byte = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    if s == 0.0 {
        let v = to_byte(l);
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f64| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };

    (
        to_byte(hue(h + 1.0 / 3.0)),
        to_byte(hue(h)),
        to_byte(hue(h - 1.0 / 3.0)),
    )
}
