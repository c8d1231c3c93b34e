//! Jet colormap for rendering normalized intensity.

/// Control points `(position, value)` of each channel, as in the classic jet map.
const RED: &[(f32, f32)] = &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const GREEN: &[(f32, f32)] = &[
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const BLUE: &[(f32, f32)] = &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

/// Maps an 8-bit intensity to an RGB triple.
pub fn jet(value: u8) -> (u8, u8, u8) {
    let x = value as f32 / 255.0;
    (
        to_u8(interpolate(RED, x)),
        to_u8(interpolate(GREEN, x)),
        to_u8(interpolate(BLUE, x)),
    )
}

fn interpolate(points: &[(f32, f32)], x: f32) -> f32 {
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    points.last().map(|&(_, y)| y).unwrap_or(0.0)
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
