//! Tray icon generation.
//!
//! Draws a microphone glyph colored by keeper status.

use crate::monitor::KeeperStatus;

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

type Rgb = (u8, u8, u8);

const GREEN: Rgb = (60, 180, 60);
const ORANGE: Rgb = (245, 158, 11);
const RED: Rgb = (220, 60, 60);
const WHITE: Rgb = (255, 255, 255);
const BLACK: Rgb = (0, 0, 0);

/// Main glyph color for a status.
pub fn status_color(status: KeeperStatus) -> Rgb {
    match status {
        KeeperStatus::Active => GREEN,
        KeeperStatus::Simulating => ORANGE,
        KeeperStatus::Stopped | KeeperStatus::Error => RED,
    }
}

/// Build the tray icon for a status.
///
/// `activity` adds a small white dot once corrections have happened.
#[cfg(windows)]
pub fn create_status_icon(status: KeeperStatus, activity: bool) -> Result<tray_icon::Icon, String> {
    let rgba = generate_status_icon(status, activity);
    tray_icon::Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| e.to_string())
}

/// Generate the status icon as RGBA data.
pub fn generate_status_icon(status: KeeperStatus, activity: bool) -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];
    let color = status_color(status);

    // Microphone head
    fill_ellipse(&mut rgba, size, (16.0, 12.0), (6.0, 5.0), color);

    // Stem
    fill_rect(&mut rgba, size, (15, 17), (17, 25), color);

    // Base
    fill_rect(&mut rgba, size, (11, 25), (21, 27), color);

    if activity {
        fill_ellipse(&mut rgba, size, (27.0, 27.0), (3.0, 3.0), BLACK);
        fill_ellipse(&mut rgba, size, (27.0, 27.0), (2.0, 2.0), WHITE);
    }

    rgba
}

fn put_pixel(rgba: &mut [u8], size: usize, x: usize, y: usize, (r, g, b): Rgb) {
    if x < size && y < size {
        let idx = (y * size + x) * 4;
        rgba[idx] = r;
        rgba[idx + 1] = g;
        rgba[idx + 2] = b;
        rgba[idx + 3] = 255;
    }
}

fn fill_ellipse(rgba: &mut [u8], size: usize, center: (f32, f32), radii: (f32, f32), color: Rgb) {
    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 + 0.5 - center.0) / radii.0;
            let dy = (y as f32 + 0.5 - center.1) / radii.1;
            if dx * dx + dy * dy <= 1.0 {
                put_pixel(rgba, size, x, y, color);
            }
        }
    }
}

/// Fill the half-open rectangle [from, to).
fn fill_rect(rgba: &mut [u8], size: usize, from: (usize, usize), to: (usize, usize), color: Rgb) {
    for y in from.1..to.1 {
        for x in from.0..to.0 {
            put_pixel(rgba, size, x, y, color);
        }
    }
}
