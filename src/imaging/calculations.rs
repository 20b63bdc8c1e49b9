//! Pure bounds calculations for the filter kernels.
//!
//! Every geometry filter changes the working canvas for the filters that run
//! after it. These functions compute that change without touching pixels, so
//! a whole pipeline's output size can be predicted (and tested) up front.

/// Target size for a resize.
///
/// A zero side is derived from the other one, preserving the source aspect
/// ratio and never dropping below one pixel. `0x0` leaves the image unchanged.
///
/// ```text
/// (1000, 500) → resize 400x0 → (400, 200)
/// (1000, 500) → resize 0x100 → (200, 100)
/// ```
pub fn resize_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    match target {
        (0, 0) => source,
        (w, 0) => {
            let h = (w as f64 * src_h as f64 / src_w as f64).round();
            (w, (h as u32).max(1))
        }
        (0, h) => {
            let w = (h as f64 * src_w as f64 / src_h as f64).round();
            ((w as u32).max(1), h)
        }
        exact => exact,
    }
}

/// Size of a crop, clamped to the current canvas. A zero side keeps the
/// current length of that side.
pub fn crop_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let clamp = |requested: u32, available: u32| {
        if requested == 0 {
            available
        } else {
            requested.min(available)
        }
    };
    (clamp(target.0, source.0), clamp(target.1, source.1))
}

/// Top-left corner of a left-anchored crop: flush with the left edge and
/// vertically centred.
pub fn crop_origin(source: (u32, u32), crop: (u32, u32)) -> (u32, u32) {
    (0, source.1.saturating_sub(crop.1) / 2)
}

/// Fold an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if folded >= 360.0 { 0.0 } else { folded }
}

/// Quarter turns for angles that are an exact multiple of 90°, counter-clockwise.
pub fn quarter_turns(degrees: f32) -> Option<u32> {
    let folded = normalize_degrees(degrees);
    let turns = (folded / 90.0).round();
    if (folded - turns * 90.0).abs() < 1e-4 {
        Some(turns as u32 % 4)
    } else {
        None
    }
}

/// Bounding box of a canvas rotated by `degrees`.
///
/// Quarter turns are exact (sides swap on 90° and 270°). Any other angle
/// yields the smallest axis-aligned box containing the rotated rectangle.
pub fn rotated_dimensions(source: (u32, u32), degrees: f32) -> (u32, u32) {
    let (w, h) = source;
    if let Some(turns) = quarter_turns(degrees) {
        return if turns % 2 == 1 { (h, w) } else { (w, h) };
    }
    let radians = normalize_degrees(degrees).to_radians() as f64;
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let bw = w as f64 * cos + h as f64 * sin;
    let bh = w as f64 * sin + h as f64 * cos;
    // Trim float noise before ceiling so 45° on a square doesn't gain a pixel
    let side = |v: f64| ((v - 1e-6).ceil() as u32).max(1);
    (side(bw), side(bh))
}
