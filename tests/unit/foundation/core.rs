use super::*;

#[test]
fn fps_parses_ffprobe_rates() {
    assert_eq!(Fps::parse("30/1").unwrap(), Fps { num: 30, den: 1 });
    assert_eq!(
        Fps::parse("30000/1001").unwrap(),
        Fps {
            num: 30_000,
            den: 1001
        }
    );
    assert_eq!(Fps::parse("25").unwrap(), Fps { num: 25, den: 1 });
    assert!(Fps::parse("0/0").is_err());
    assert!(Fps::parse("abc").is_err());
}

#[test]
fn fps_frames_to_secs_uses_rational() {
    let fps = Fps::new(30, 1).unwrap();
    assert!((fps.frames_to_secs(90) - 3.0).abs() < 1e-12);
}

#[test]
fn size_from_str_accepts_wxh() {
    let s: Size = "640x360".parse().unwrap();
    assert_eq!(s, Size::new(640, 360).unwrap());
    assert!("640".parse::<Size>().is_err());
    assert!("0x10".parse::<Size>().is_err());
    assert_eq!(s.to_string(), "640x360");
}

#[test]
fn rect_fits_within_checks_bounds() {
    let bounds = Size::new(10, 10).unwrap();
    assert!(PixelRect::full(bounds).fits_within(bounds));
    let r = PixelRect {
        x: 5,
        y: 5,
        width: 6,
        height: 1,
    };
    assert!(!r.fits_within(bounds));
    let empty = PixelRect {
        x: 0,
        y: 0,
        width: 0,
        height: 4,
    };
    assert!(!empty.fits_within(bounds));
}
