use super::*;
use image::{Rgb, Rgba};

fn gradient_bg(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]))
}

#[test]
fn transparent_foreground_is_identity() {
    let bg = gradient_bg(16, 9);
    let fg = RgbaImage::from_pixel(5, 5, Rgba([255, 0, 255, 0]));
    for (x, y) in [(0, 0), (3, 2), (-2, -2), (14, 7)] {
        let out = composite(bg.clone(), &fg, x, y);
        assert_eq!(out, bg, "offset ({x},{y})");
    }
}

#[test]
fn opaque_full_cover_reproduces_foreground() {
    let bg = gradient_bg(8, 6);
    let fg = RgbaImage::from_fn(8, 6, |x, y| Rgba([x as u8 * 30, 200, y as u8 * 40, 255]));
    let out = composite(bg, &fg, 0, 0);
    for (x, y, p) in out.enumerate_pixels() {
        let f = fg.get_pixel(x, y).0;
        assert_eq!(p.0, [f[0], f[1], f[2]]);
    }
}

#[test]
fn half_alpha_blends_with_truncation() {
    let bg = RgbImage::from_pixel(1, 1, Rgb([100, 0, 255]));
    let fg = RgbaImage::from_pixel(1, 1, Rgba([201, 255, 0, 128]));
    let out = composite(bg, &fg, 0, 0);
    let a = 128.0f64 / 255.0;
    let expect = |f: f64, b: f64| (f * a + b * (1.0 - a)) as u8;
    assert_eq!(
        out.get_pixel(0, 0).0,
        [expect(201.0, 100.0), expect(255.0, 0.0), expect(0.0, 255.0)]
    );
}

#[test]
fn low_alpha_blend_truncates_in_double_precision() {
    // 1 * a + 103 * (1 - a) lands just below 101 at a = 5 / 255.
    let bg = RgbImage::from_pixel(1, 1, Rgb([103, 103, 103]));
    let fg = RgbaImage::from_pixel(1, 1, Rgba([1, 1, 1, 5]));
    let out = composite(bg, &fg, 0, 0);
    assert_eq!(out.get_pixel(0, 0).0, [100, 100, 100]);
}

#[test]
fn partially_offscreen_foreground_is_clipped() {
    let bg = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
    let fg = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));

    let out = composite(bg.clone(), &fg, 8, -2);
    let white = out.pixels().filter(|p| p.0 == [255, 255, 255]).count();
    assert_eq!(white, 2 * 2);
    assert_eq!(out.get_pixel(9, 0).0, [255, 255, 255]);
    assert_eq!(out.get_pixel(7, 0).0, [0, 0, 0]);

    let isect = intersect(10, 10, 4, 4, 8, -2).unwrap();
    assert_eq!(
        isect,
        Intersection {
            bg_x: 8,
            bg_y: 0,
            fg_x: 0,
            fg_y: 2,
            width: 2,
            height: 2,
        }
    );
}

#[test]
fn disjoint_placement_is_silent_noop() {
    let bg = gradient_bg(10, 10);
    let fg = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
    let mut out = bg.clone();
    assert!(composite_in_place(&mut out, &fg, 10, 0).is_none());
    assert!(composite_in_place(&mut out, &fg, -4, 3).is_none());
    assert!(composite_in_place(&mut out, &fg, 2, 50).is_none());
    assert_eq!(out, bg);
}

#[test]
fn foreground_region_uses_matching_source_pixels() {
    let bg = RgbImage::new(6, 6);
    let fg = RgbaImage::from_fn(3, 3, |x, y| Rgba([x as u8 + 1, y as u8 + 1, 9, 255]));
    let out = composite(bg, &fg, -1, -1);
    // bg (0,0) takes fg (1,1)
    assert_eq!(out.get_pixel(0, 0).0, [2, 2, 9]);
    assert_eq!(out.get_pixel(1, 1).0, [3, 3, 9]);
    assert_eq!(out.get_pixel(2, 2).0, [0, 0, 0]);
}
