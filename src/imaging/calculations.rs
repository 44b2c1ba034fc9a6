//! Pure calculation functions for thumbnail geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Resize-then-crop plan for one thumbnail.
///
/// The source is first resampled to `intermediate_width` × `intermediate_height`
/// (aspect ratio preserved, covering the target box), then a
/// `crop_width` × `crop_height` window is cut out at (`crop_x`, `crop_y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub intermediate_width: u32,
    pub intermediate_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_width: u32,
    pub crop_height: u32,
}

/// Calculate the resize and center-crop plan for a thumbnail.
///
/// If the target is relatively taller than the source, the height is pinned
/// to the target height and the width overflows; otherwise the width is
/// pinned and the height overflows. The crop box is centered on the
/// intermediate image and always has exactly the target size.
///
/// Callers must reject zero dimensions before calling.
///
/// # Examples
/// ```
/// # use simple_blog::imaging::plan;
/// // 4000x2000 landscape into a 300x300 square: scale to 600x300, cut the middle.
/// let p = plan((4000, 2000), (300, 300));
/// assert_eq!((p.intermediate_width, p.intermediate_height), (600, 300));
/// assert_eq!((p.crop_x, p.crop_y), (150, 0));
/// ```
pub fn plan(source: (u32, u32), target: (u32, u32)) -> CropPlan {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    debug_assert!(src_w > 0 && src_h > 0 && tgt_w > 0 && tgt_h > 0);

    let aspect = src_w as f64 / src_h as f64;

    let (inter_w, inter_h) =
        if (tgt_h as f64 / tgt_w as f64) > (src_h as f64 / src_w as f64) {
            // Target is relatively taller: height matches, width overflows
            let w = (tgt_h as f64 * aspect).round() as u32;
            (w.max(tgt_w), tgt_h)
        } else {
            // Target is relatively wider (or equal): width matches, height overflows
            let h = (tgt_w as f64 / aspect).round() as u32;
            (tgt_w, h.max(tgt_h))
        };

    let crop_x = centered_offset(inter_w, tgt_w);
    let crop_y = centered_offset(inter_h, tgt_h);

    CropPlan {
        intermediate_width: inter_w,
        intermediate_height: inter_h,
        crop_x,
        crop_y,
        crop_width: tgt_w,
        crop_height: tgt_h,
    }
}

/// Offset of a `window`-sized span centered on `total`, floored.
fn centered_offset(total: u32, window: u32) -> u32 {
    let start = (total as f64 / 2.0 - window as f64 / 2.0).floor() as i64;
    let end = start + window as i64;
    start.min(end).clamp(0, (total - window) as i64) as u32
}
