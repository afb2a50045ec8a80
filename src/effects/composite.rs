use image::{RgbImage, RgbaImage};

/// Region of the background a placed foreground actually touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intersection {
    /// Left edge on the background.
    pub bg_x: u32,
    /// Top edge on the background.
    pub bg_y: u32,
    /// Left edge on the foreground.
    pub fg_x: u32,
    /// Top edge on the foreground.
    pub fg_y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clip a `fg_w x fg_h` rectangle placed at `(x, y)` against a `bg_w x bg_h` canvas.
///
/// Returns `None` when nothing overlaps.
pub fn intersect(bg_w: u32, bg_h: u32, fg_w: u32, fg_h: u32, x: i64, y: i64) -> Option<Intersection> {
    let x1 = x.max(0);
    let y1 = y.max(0);
    let x2 = (x + i64::from(fg_w)).min(i64::from(bg_w));
    let y2 = (y + i64::from(fg_h)).min(i64::from(bg_h));
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Intersection {
        bg_x: x1 as u32,
        bg_y: y1 as u32,
        fg_x: (x1 - x) as u32,
        fg_y: (y1 - y) as u32,
        width: (x2 - x1) as u32,
        height: (y2 - y1) as u32,
    })
}

/// Blend straight-alpha `foreground` onto `background` with its top-left at `(x, y)`.
///
/// Each channel becomes `fg * a + bg * (1 - a)` with `a = alpha / 255`, truncated to `u8`. Parts
/// of the foreground outside the background are clipped; no overlap leaves `background` untouched.
/// Returns the blended region.
pub fn composite_in_place(
    background: &mut RgbImage,
    foreground: &RgbaImage,
    x: i64,
    y: i64,
) -> Option<Intersection> {
    let (bg_w, bg_h) = background.dimensions();
    let (fg_w, fg_h) = foreground.dimensions();
    let isect = intersect(bg_w, bg_h, fg_w, fg_h, x, y)?;

    let bg_stride = bg_w as usize * 3;
    let fg_stride = fg_w as usize * 4;
    let fg: &[u8] = foreground.as_raw();
    let bg: &mut [u8] = &mut *background;

    for row in 0..isect.height as usize {
        let bg_off = (isect.bg_y as usize + row) * bg_stride + isect.bg_x as usize * 3;
        let fg_off = (isect.fg_y as usize + row) * fg_stride + isect.fg_x as usize * 4;
        let n = isect.width as usize;
        let bg_row = &mut bg[bg_off..bg_off + n * 3];
        let fg_row = &fg[fg_off..fg_off + n * 4];

        for (d, s) in bg_row.chunks_exact_mut(3).zip(fg_row.chunks_exact(4)) {
            match s[3] {
                0 => {}
                255 => d.copy_from_slice(&s[..3]),
                a => {
                    let a = f64::from(a) / 255.0;
                    for c in 0..3 {
                        let v = f64::from(s[c]) * a + f64::from(d[c]) * (1.0 - a);
                        d[c] = v.clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
    }

    Some(isect)
}

/// Owned variant of [`composite_in_place`].
pub fn composite(mut background: RgbImage, foreground: &RgbaImage, x: i64, y: i64) -> RgbImage {
    composite_in_place(&mut background, foreground, x, y);
    background
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
