use image::{RgbImage, RgbaImage};
use rayon::prelude::*;

/// HSV triple on the 8-bit scale used for keying: hue in `[0, 180)`, saturation and value in
/// `[0, 255]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Hsv8 {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv8 {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive HSV band whose pixels are treated as background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChromaKey {
    /// Lower bound, inclusive on every channel.
    pub lower: Hsv8,
    /// Upper bound, inclusive on every channel.
    pub upper: Hsv8,
}

impl ChromaKey {
    /// Default green-screen band.
    pub const GREEN: Self = Self {
        lower: Hsv8::new(35, 100, 100),
        upper: Hsv8::new(85, 255, 255),
    };

    /// Return `true` when `hsv` falls inside the band.
    pub fn contains(&self, hsv: Hsv8) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }

    pub fn validate(&self) -> crate::OverlayResult<()> {
        if self.lower.h > self.upper.h || self.lower.s > self.upper.s || self.lower.v > self.upper.v
        {
            return Err(crate::OverlayError::validation(
                "chroma key lower bound must be <= upper bound on every channel",
            ));
        }
        if self.upper.h >= 180 {
            return Err(crate::OverlayError::validation(
                "chroma key hue must be < 180",
            ));
        }
        Ok(())
    }
}

impl Default for ChromaKey {
    fn default() -> Self {
        Self::GREEN
    }
}

const HSV_SHIFT: u32 = 12;

const fn div_round(num: i32, den: i32) -> i32 {
    let q = num / den;
    let r = num % den;
    if 2 * r > den || (2 * r == den && q & 1 == 1) {
        q + 1
    } else {
        q
    }
}

/// `round((255 << 12) / i)`, zero at index 0.
const SAT_DIV: [i32; 256] = {
    let mut t = [0; 256];
    let mut i = 1;
    while i < 256 {
        t[i] = div_round(255 << HSV_SHIFT, i as i32);
        i += 1;
    }
    t
};

/// `round((180 << 12) / (6 * i))`, zero at index 0.
const HUE_DIV: [i32; 256] = {
    let mut t = [0; 256];
    let mut i = 1;
    while i < 256 {
        t[i] = div_round(180 << HSV_SHIFT, 6 * i as i32);
        i += 1;
    }
    t
};

/// Convert one RGB8 pixel to 8-bit HSV (hue halved into `[0, 180)`).
///
/// Fixed-point with 12 fractional bits and reciprocal tables, bit-exact with the OpenCV 8-bit
/// `RGB2HSV` conversion so band edges key the same pixels.
pub fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> Hsv8 {
    let v = r.max(g).max(b);
    let diff = i32::from(v - r.min(g).min(b));
    let (ri, gi, bi) = (i32::from(r), i32::from(g), i32::from(b));
    let half = 1 << (HSV_SHIFT - 1);

    let s = (diff * SAT_DIV[usize::from(v)] + half) >> HSV_SHIFT;

    let raw = if v == r {
        gi - bi
    } else if v == g {
        bi - ri + 2 * diff
    } else {
        ri - gi + 4 * diff
    };
    let mut h = (raw * HUE_DIV[diff as usize] + half) >> HSV_SHIFT;
    if h < 0 {
        h += 180;
    }

    Hsv8 {
        h: h.clamp(0, 179) as u8,
        s: s.clamp(0, 255) as u8,
        v,
    }
}

/// Key `frame` against `key`, producing straight-alpha RGBA.
///
/// Color channels are copied unchanged; alpha is `0` for pixels inside the band and `255`
/// otherwise (hard mask, no feathering or spill suppression).
pub fn extract_alpha(frame: &RgbImage, key: &ChromaKey) -> RgbaImage {
    let (width, height) = frame.dimensions();
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    let src_stride = width as usize * 3;
    let dst_stride = width as usize * 4;
    let src: &[u8] = frame.as_raw();
    let dst: &mut [u8] = &mut out;

    dst.par_chunks_exact_mut(dst_stride)
        .zip(src.par_chunks_exact(src_stride))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(3)) {
                let hsv = rgb_to_hsv8(s[0], s[1], s[2]);
                d[..3].copy_from_slice(s);
                d[3] = if key.contains(hsv) { 0 } else { 255 };
            }
        });

    out
}

#[cfg(test)]
#[path = "../../tests/unit/effects/chroma_key.rs"]
mod tests;
