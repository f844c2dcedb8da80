use ratatui::crossterm::style::Color;

use crate::core::event::AuthorColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    Truecolor,
    X256,
    X16,
}

/// Detect terminal color depth from environment.
/// Priority: TERCORD_COLOR override -> COLORTERM truecolor/24bit -> TERM *256color -> 16.
pub fn detect_color_depth() -> ColorDepth {
    depth_from_env(
        std::env::var("TERCORD_COLOR").ok().as_deref(),
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

fn depth_from_env(force: Option<&str>, colorterm: Option<&str>, term: Option<&str>) -> ColorDepth {
    if let Some(force) = force {
        match force.trim().to_ascii_lowercase().as_str() {
            "truecolor" | "24bit" | "24-bit" => return ColorDepth::Truecolor,
            "256" | "x256" | "256color" => return ColorDepth::X256,
            "16" | "ansi" | "x16" => return ColorDepth::X16,
            _ => {}
        }
    }

    if let Some(colorterm) = colorterm {
        let s = colorterm.to_ascii_lowercase();
        if s.contains("truecolor") || s.contains("24bit") || s.contains("24-bit") {
            return ColorDepth::Truecolor;
        }
    }
    if let Some(term) = term {
        if term.to_ascii_lowercase().contains("256color") {
            return ColorDepth::X256;
        }
    }
    ColorDepth::X16
}

/// Terminal color for a message author, or `None` when the author has no color.
pub fn author_color(color: AuthorColor, depth: ColorDepth) -> Option<Color> {
    let (r, g, b) = color.rgb()?;
    Some(quantize_color(Color::Rgb { r, g, b }, depth))
}

/// Map a Color to the nearest representable color in the chosen depth.
pub fn quantize_color(color: Color, depth: ColorDepth) -> Color {
    match depth {
        ColorDepth::Truecolor => color,
        ColorDepth::X256 => match color {
            Color::Rgb { r, g, b } => Color::AnsiValue(rgb_to_xterm256(r, g, b)),
            other => other,
        },
        ColorDepth::X16 => match color {
            Color::Rgb { r, g, b } => nearest_ansi16_from_rgb(r, g, b),
            Color::AnsiValue(i) => {
                let (r, g, b) = xterm256_to_rgb(i);
                nearest_ansi16_from_rgb(r, g, b)
            }
            other => other,
        },
    }
}

fn nearest_ansi16_from_rgb(r: u8, g: u8, b: u8) -> Color {
    // 0..7 standard, 8..15 bright
    const ANSI16: &[(u8, u8, u8, Color); 16] = &[
        (0, 0, 0, Color::Black),
        (205, 0, 0, Color::DarkRed),
        (0, 205, 0, Color::DarkGreen),
        (205, 205, 0, Color::DarkYellow),
        (0, 0, 205, Color::DarkBlue),
        (205, 0, 205, Color::DarkMagenta),
        (0, 205, 205, Color::DarkCyan),
        (192, 192, 192, Color::Grey),
        (128, 128, 128, Color::DarkGrey),
        (255, 0, 0, Color::Red),
        (0, 255, 0, Color::Green),
        (255, 255, 0, Color::Yellow),
        (92, 92, 255, Color::Blue),
        (255, 0, 255, Color::Magenta),
        (0, 255, 255, Color::Cyan),
        (255, 255, 255, Color::White),
    ];

    let mut best = 0usize;
    let mut best_dist = u32::MAX;
    for (i, &(rr, gg, bb, _)) in ANSI16.iter().enumerate() {
        let dist = color_dist_sq(r, g, b, rr, gg, bb);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    ANSI16[best].3
}

fn rgb_to_xterm256(r: u8, g: u8, b: u8) -> u8 {
    // Nearest of the 6x6x6 cube and the grayscale ramp.
    let cube_index = rgb_to_xterm_cube_index(r, g, b);
    let (cr, cg, cb) = xterm256_to_rgb(cube_index);
    let cube_dist = color_dist_sq(r, g, b, cr, cg, cb);

    let gray_index = rgb_to_xterm_gray_index(r, g, b);
    let (gr, gg, gb) = xterm256_to_rgb(gray_index);
    let gray_dist = color_dist_sq(r, g, b, gr, gg, gb);

    if gray_dist < cube_dist {
        gray_index
    } else {
        cube_index
    }
}

fn rgb_to_xterm_cube_index(r: u8, g: u8, b: u8) -> u8 {
    fn map_comp(c: u8) -> u8 {
        if c < 48 {
            0
        } else if c < 114 {
            1
        } else {
            ((c - 35) / 40).min(5)
        }
    }
    16 + 36 * map_comp(r) + 6 * map_comp(g) + map_comp(b)
}

fn rgb_to_xterm_gray_index(r: u8, g: u8, b: u8) -> u8 {
    let avg = (r as u16 + g as u16 + b as u16) / 3;
    let idx = (avg.saturating_sub(8) / 10).min(23) as u8;
    232 + idx
}

fn color_dist_sq(r1: u8, g1: u8, b1: u8, r2: u8, g2: u8, b2: u8) -> u32 {
    let dr = r1 as i32 - r2 as i32;
    let dg = g1 as i32 - g2 as i32;
    let db = b1 as i32 - b2 as i32;
    (dr * dr + dg * dg + db * db) as u32
}

fn xterm_cube_comp(i: u8) -> u8 {
    if i == 0 {
        0
    } else {
        55 + 40 * i
    }
}

pub fn xterm256_to_rgb(i: u8) -> (u8, u8, u8) {
    match i {
        0 => (0, 0, 0),
        1 => (205, 0, 0),
        2 => (0, 205, 0),
        3 => (205, 205, 0),
        4 => (0, 0, 205),
        5 => (205, 0, 205),
        6 => (0, 205, 205),
        7 => (229, 229, 229),
        8 => (127, 127, 127),
        9 => (255, 0, 0),
        10 => (0, 255, 0),
        11 => (255, 255, 0),
        12 => (92, 92, 255),
        13 => (255, 0, 255),
        14 => (0, 255, 255),
        15 => (255, 255, 255),
        16..=231 => {
            let n = i - 16;
            (
                xterm_cube_comp(n / 36),
                xterm_cube_comp((n % 36) / 6),
                xterm_cube_comp(n % 6),
            )
        }
        232..=255 => {
            let v = 8 + 10 * (i - 232);
            (v, v, v)
        }
    }
}
