//! CSS colour values for inline `style` attributes.

use ks_css::parse_declarations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Parses a named colour, `#rgb`, `#rrggbb` or `rgb()`/`rgba()` value.
/// Alpha is accepted and ignored.
pub fn parse_color(value: &str) -> Option<Rgb> {
    let raw = value.trim().to_ascii_lowercase();

    if let Some(hex) = raw.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = raw
        .strip_prefix("rgba(")
        .or_else(|| raw.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(args);
    }

    named_color(&raw)
}

/// The `color` declared in an inline `style` attribute, if it parses.
/// A later `color` declaration wins over an earlier one.
pub fn color_from_style(style: &str) -> Option<Rgb> {
    parse_declarations(style)
        .into_iter()
        .filter(|declaration| declaration.name == "color")
        .filter_map(|declaration| parse_color(&declaration.value))
        .last()
}

fn named_color(name: &str) -> Option<Rgb> {
    let rgb = match name {
        "black" => Rgb::new(0, 0, 0),
        "white" => Rgb::new(255, 255, 255),
        "gray" | "grey" => Rgb::new(128, 128, 128),
        "silver" => Rgb::new(192, 192, 192),
        "red" => Rgb::new(255, 0, 0),
        "maroon" => Rgb::new(128, 0, 0),
        "green" => Rgb::new(0, 128, 0),
        "lime" => Rgb::new(0, 255, 0),
        "blue" => Rgb::new(0, 0, 255),
        "navy" => Rgb::new(0, 0, 128),
        "yellow" => Rgb::new(255, 255, 0),
        "olive" => Rgb::new(128, 128, 0),
        "purple" => Rgb::new(128, 0, 128),
        "fuchsia" | "magenta" => Rgb::new(255, 0, 255),
        "teal" => Rgb::new(0, 128, 128),
        "aqua" | "cyan" => Rgb::new(0, 255, 255),
        "orange" => Rgb::new(255, 165, 0),
        _ => return None,
    };
    Some(rgb)
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: core::ops::Range<usize>| -> Option<u8> {
        let digits = &hex[range];
        let value = u8::from_str_radix(digits, 16).ok()?;
        Some(if digits.len() == 1 { value * 17 } else { value })
    };

    match hex.len() {
        3 | 4 => Some(Rgb::new(channel(0..1)?, channel(1..2)?, channel(2..3)?)),
        6 | 8 => Some(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        _ => None,
    }
}

fn parse_rgb_function(args: &str) -> Option<Rgb> {
    let parts = args.split(',').map(str::trim).collect::<Vec<_>>();
    if !matches!(parts.len(), 3 | 4) {
        return None;
    }

    Some(Rgb::new(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
    ))
}

fn parse_channel(value: &str) -> Option<u8> {
    if let Some(percent) = value.strip_suffix('%') {
        let value = percent.trim().parse::<f32>().ok()?.clamp(0.0, 100.0);
        return Some((value / 100.0 * 255.0).round() as u8);
    }
    let value = value.parse::<f32>().ok()?.clamp(0.0, 255.0);
    Some(value.round() as u8)
}
