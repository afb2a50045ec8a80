use super::*;

fn request(treatment: AudioTreatment, main_audio: bool, avatar_audio: bool) -> MuxRequest {
    let (main_span, avatar_span, first, second) = match treatment {
        AudioTreatment::MixFirst => (3.0, 3.0, ("main.mp4", main_audio), ("avatar.mp4", avatar_audio)),
        AudioTreatment::Concat => (3.0, 1.0, ("avatar.mp4", avatar_audio), ("main.mp4", main_audio)),
    };
    let span = |name: &str| if name == "main.mp4" { main_span } else { avatar_span };
    MuxRequest {
        video: PathBuf::from("silent.mp4"),
        video_secs: match treatment {
            AudioTreatment::MixFirst => 3.0,
            AudioTreatment::Concat => 4.0,
        },
        treatment,
        tracks: vec![
            AudioTrack {
                source: PathBuf::from(first.0),
                has_audio: first.1,
                span_secs: span(first.0),
            },
            AudioTrack {
                source: PathBuf::from(second.0),
                has_audio: second.1,
                span_secs: span(second.0),
            },
        ],
        out_path: PathBuf::from("out/generated.mp4"),
        overwrite: true,
    }
}

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
}

fn graph(args: &[String]) -> &str {
    let at = args.iter().position(|a| a == "-filter_complex").unwrap();
    &args[at + 1]
}

#[test]
fn mix_uses_duration_first_and_copies_video() {
    let args = strings(&build_mux_args(&request(AudioTreatment::MixFirst, true, true)).unwrap());
    let g = graph(&args);
    assert!(g.contains("[a0][a1]amix=inputs=2:duration=first:dropout_transition=0[mix]"));
    assert!(g.ends_with("[mix]apad,atrim=duration=3.000000[aout]"));
    assert!(!g.contains("concat"));

    let copy = args.iter().position(|a| a == "-c:v").unwrap();
    assert_eq!(args[copy + 1], "copy");
    assert_eq!(args.last().map(String::as_str), Some("out/generated.mp4"));
    assert_eq!(args[0], "-y");
}

#[test]
fn concat_pads_each_segment_to_its_span() {
    let args = strings(&build_mux_args(&request(AudioTreatment::Concat, true, true)).unwrap());
    let g = graph(&args);
    assert!(g.contains("[1:a:0]"));
    assert!(g.contains("apad,atrim=duration=1.000000[a0]"));
    assert!(g.contains("apad,atrim=duration=3.000000[a1]"));
    assert!(g.contains("[a0][a1]concat=n=2:v=0:a=1[cat]"));
    assert!(g.ends_with("[cat]apad,atrim=duration=4.000000[aout]"));

    // Avatar audio is input 1, main audio input 2.
    let inputs: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(i, _)| *i > 0 && args[i - 1] == "-i")
        .map(|(_, a)| a)
        .collect();
    assert_eq!(inputs, ["silent.mp4", "avatar.mp4", "main.mp4"]);
}

#[test]
fn missing_audio_is_replaced_with_silence_of_the_track_span() {
    let args = strings(&build_mux_args(&request(AudioTreatment::Concat, true, false)).unwrap());
    let lavfi = args.iter().position(|a| a == "lavfi").unwrap();
    assert_eq!(args[lavfi + 1], "-t");
    assert_eq!(args[lavfi + 2], "1.000000");
    assert_eq!(args[lavfi + 3], "-i");
    assert_eq!(args[lavfi + 4], "anullsrc=r=48000:cl=stereo");
    assert!(!args.iter().any(|a| a == "avatar.mp4"));
}

#[test]
fn both_tracks_silent_is_still_muxable() {
    let args = strings(&build_mux_args(&request(AudioTreatment::MixFirst, false, false)).unwrap());
    assert_eq!(args.iter().filter(|a| a.starts_with("anullsrc")).count(), 2);
}

#[test]
fn no_overwrite_uses_dash_n() {
    let mut req = request(AudioTreatment::MixFirst, true, true);
    req.overwrite = false;
    let args = strings(&build_mux_args(&req).unwrap());
    assert_eq!(args[0], "-n");
}

#[test]
fn single_track_skips_the_combiner() {
    let mut req = request(AudioTreatment::MixFirst, true, true);
    req.tracks.truncate(1);
    let args = strings(&build_mux_args(&req).unwrap());
    let g = graph(&args);
    assert!(!g.contains("amix"));
    assert!(g.ends_with("[a0]apad,atrim=duration=3.000000[aout]"));
}

#[test]
fn invalid_requests_are_rejected() {
    let mut empty = request(AudioTreatment::MixFirst, true, true);
    empty.tracks.clear();
    assert!(matches!(
        build_mux_args(&empty),
        Err(OverlayError::Validation(_))
    ));

    let mut zero = request(AudioTreatment::Concat, true, true);
    zero.video_secs = 0.0;
    assert!(build_mux_args(&zero).is_err());

    let mut negative = request(AudioTreatment::Concat, true, true);
    negative.tracks[0].span_secs = -1.0;
    assert!(build_mux_args(&negative).is_err());
}

#[test]
fn check_output_rejects_missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mp4");
    assert!(matches!(check_output(&missing), Err(OverlayError::Encode(_))));

    let empty = dir.path().join("empty.mp4");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(check_output(&empty), Err(OverlayError::Encode(_))));

    let full = dir.path().join("full.mp4");
    std::fs::write(&full, b"data").unwrap();
    assert!(check_output(&full).is_ok());
}

#[test]
fn outcome_success_requires_exit_zero() {
    let ok = CommandOutcome {
        code: Some(0),
        stderr: String::new(),
    };
    let failed = CommandOutcome {
        code: Some(1),
        stderr: "boom".into(),
    };
    let killed = CommandOutcome {
        code: None,
        stderr: String::new(),
    };
    assert!(ok.success());
    assert!(!failed.success());
    assert!(!killed.success());
}

/// Stand-in `ffmpeg`: writes `payload` to its last argument (the output) and exits with `code`.
#[cfg(unix)]
fn fake_ffmpeg(dir: &Path, payload: &str, code: i32) -> FfmpegTools {
    use std::os::unix::fs::PermissionsExt as _;
    let script = dir.join(format!("ffmpeg-{code}-{}", payload.len()));
    let body = format!(
        "#!/bin/sh\nfor last; do :; done\nprintf '%s' '{payload}' > \"$last\"\necho 'mux failed' >&2\nexit {code}\n"
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    FfmpegTools {
        ffmpeg: script,
        ffprobe: PathBuf::from("ffprobe"),
    }
}

#[cfg(unix)]
fn request_into(out_path: PathBuf, overwrite: bool) -> MuxRequest {
    MuxRequest {
        out_path,
        overwrite,
        ..request(AudioTreatment::MixFirst, true, true)
    }
}

#[cfg(unix)]
#[test]
fn failed_mux_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("videos").join("generated_host_parallel.mp4");
    let muxer = FfmpegMuxer::new(fake_ffmpeg(dir.path(), "partial", 1));

    let err = muxer.mux(&request_into(out.clone(), true)).unwrap_err();
    assert!(matches!(err, OverlayError::Encode(_)));
    assert!(err.to_string().contains("mux failed"));
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn empty_mux_output_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated_host_parallel.mp4");
    let muxer = FfmpegMuxer::new(fake_ffmpeg(dir.path(), "", 0));

    let err = muxer.mux(&request_into(out.clone(), true)).unwrap_err();
    assert!(matches!(err, OverlayError::Encode(_)));
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn successful_mux_keeps_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated_host_parallel.mp4");
    let muxer = FfmpegMuxer::new(fake_ffmpeg(dir.path(), "mp4data", 0));

    let outcome = muxer.mux(&request_into(out.clone(), true)).unwrap();
    assert!(outcome.success());
    assert_eq!(std::fs::read(&out).unwrap(), b"mp4data");
}

#[cfg(unix)]
#[test]
fn refused_overwrite_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated_host_parallel.mp4");
    std::fs::write(&out, b"earlier render").unwrap();
    let muxer = FfmpegMuxer::new(fake_ffmpeg(dir.path(), "partial", 1));

    assert!(muxer.mux(&request_into(out.clone(), false)).is_err());
    assert!(out.exists());
}
