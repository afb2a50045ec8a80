use super::*;
use image::Rgb;

fn solid(size: Size, v: u8) -> RgbImage {
    RgbImage::from_pixel(size.width, size.height, Rgb([v, v, v]))
}

#[test]
fn memory_source_restarts_from_first_frame() {
    let size = Size::new(4, 2).unwrap();
    let src = MemoryVideoSource::new(
        "clip",
        size,
        Fps::new(30, 1).unwrap(),
        (0..3).map(|i| solid(size, i)).collect(),
    )
    .unwrap();

    let first: Vec<u8> = src
        .frames()
        .unwrap()
        .map(|f| f.unwrap().get_pixel(0, 0).0[0])
        .collect();
    let second: Vec<u8> = src
        .frames()
        .unwrap()
        .map(|f| f.unwrap().get_pixel(0, 0).0[0])
        .collect();
    assert_eq!(first, vec![0, 1, 2]);
    assert_eq!(first, second);
    assert_eq!(src.first_frame().unwrap().get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(src.info().frame_count, Some(3));
}

#[test]
fn memory_source_rejects_mismatched_frames() {
    let size = Size::new(4, 2).unwrap();
    let frames = vec![solid(size, 0), solid(Size::new(2, 2).unwrap(), 0)];
    assert!(MemoryVideoSource::new("clip", size, Fps::new(30, 1).unwrap(), frames).is_err());
}

#[test]
fn empty_source_has_no_first_frame() {
    let src = MemoryVideoSource::new(
        "empty",
        Size::new(2, 2).unwrap(),
        Fps::new(30, 1).unwrap(),
        Vec::new(),
    )
    .unwrap();
    assert!(matches!(
        src.first_frame().unwrap_err(),
        OverlayError::Source(_)
    ));
}

#[test]
fn provider_reports_unknown_paths_as_source_errors() {
    let mut provider = MemorySourceProvider::new();
    let size = Size::new(2, 2).unwrap();
    provider.insert(
        "known.mp4",
        MemoryVideoSource::new("known", size, Fps::new(30, 1).unwrap(), vec![solid(size, 1)])
            .unwrap()
            .with_audio(true),
    );
    let src = provider.open(Path::new("known.mp4")).unwrap();
    assert!(src.info().has_audio);
    let Err(err) = provider.open(Path::new("missing.mp4")) else {
        panic!("expected missing source to fail");
    };
    assert!(matches!(err, OverlayError::Source(_)));
}

#[test]
fn ffmpeg_source_rejects_missing_files() {
    let err = FfmpegVideoSource::open(&FfmpegTools::default(), Path::new("/nonexistent/a.mp4"))
        .unwrap_err();
    assert!(matches!(err, OverlayError::Source(_)));
}
