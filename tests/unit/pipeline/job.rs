use super::*;
use crate::foundation::frame::PixelFormat;

fn info(frames: u64) -> SourceInfo {
    SourceInfo {
        frame_count: frames,
        width: 8,
        height: 8,
        fps: Fps::new(30, 1).unwrap(),
        format: PixelFormat::Rgb8,
    }
}

#[test]
fn terminal_states_are_final() {
    use JobStatus::*;
    assert!(Idle.can_transition_to(Running));
    assert!(Running.can_transition_to(Completed));
    assert!(Running.can_transition_to(Cancelled));
    assert!(Running.can_transition_to(Failed));
    assert!(!Running.can_transition_to(Idle));
    for terminal in [Completed, Cancelled, Failed] {
        assert!(terminal.is_terminal());
        for next in [Idle, Running, Completed, Cancelled, Failed] {
            assert!(!terminal.can_transition_to(next));
        }
    }
}

#[test]
fn range_defaults_to_whole_source_and_is_checked() {
    let mut job = Job::default();
    assert_eq!(job.resolve_range(&info(12)).unwrap(), FrameRange::first(12));
    job.range = Some(FrameRange::new(FrameIndex(2), FrameIndex(20)).unwrap());
    assert!(job.resolve_range(&info(12)).is_err());
    job.range = Some(FrameRange::new(FrameIndex(4), FrameIndex(4)).unwrap());
    assert!(job.resolve_range(&info(12)).is_err());
    assert!(Job::default().resolve_range(&info(0)).is_err());
    job.range = Some(FrameRange {
        start: FrameIndex(8),
        end: FrameIndex(3),
    });
    assert!(matches!(
        job.resolve_range(&info(12)),
        Err(FramelabError::Validation(_))
    ));
}

#[test]
fn opts_validation() {
    assert!(PipelineOpts::default().validate().is_ok());
    let bad = PipelineOpts {
        reorder_window: 0,
        ..PipelineOpts::default()
    };
    assert!(bad.validate().is_err());
    let bad = PipelineOpts {
        stall_timeout_ms: 10,
        queue_timeout_ms: 50,
        ..PipelineOpts::default()
    };
    assert!(bad.validate().is_err());
    let two = PipelineOpts {
        workers: 2,
        ..PipelineOpts::default()
    };
    assert_eq!(two.effective_workers(), 2);
    assert!(PipelineOpts::default().effective_workers() >= 1);
}

#[test]
fn cancel_token_is_shared_between_clones() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!other.is_cancelled());
    token.cancel();
    token.cancel();
    assert!(other.is_cancelled());
}

#[test]
fn progress_fraction_counts_skipped_frames() {
    let p = Progress {
        job: JobId(1),
        written: 6,
        skipped: 2,
        total: 10,
    };
    assert!((p.fraction() - 0.8).abs() < 1e-12);
}

#[test]
fn failures_name_stage_and_frame() {
    let f = JobFailure::error(Stage::Encode, Some(FrameIndex(42)), "disk full");
    assert_eq!(f.to_string(), "encode stage at frame 42: disk full");
    assert_eq!(f.status(), JobStatus::Failed);
    assert!(JobFailure::cancelled(Stage::Process).is_cancelled());
    assert!(matches!(
        FramelabError::from(JobFailure::cancelled(Stage::Decode)),
        FramelabError::Cancelled
    ));
}

#[test]
fn destination_json_is_tagged() {
    let d = Destination::Mp4 {
        path: PathBuf::from("out.mp4"),
        overwrite: true,
    };
    let s = serde_json::to_string(&d).unwrap();
    assert_eq!(s, r#"{"kind":"mp4","path":"out.mp4","overwrite":true}"#);
    let back: Destination = serde_json::from_str(r#"{"kind":"image_sequence","dir":"frames"}"#).unwrap();
    assert_eq!(
        back,
        Destination::ImageSequence {
            dir: PathBuf::from("frames")
        }
    );
}
