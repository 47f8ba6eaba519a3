//! Playback integration tests
//!
//! Runs synthetic streams through `Player` on top of the recording
//! accelerator, which rejects any submission whose barriers, references or
//! bitstream region do not line up with the surfaces it tracks.

mod common;

use avcplay_lib::config::PlayerConfig;
use avcplay_lib::error::Error;
use avcplay_lib::format::MemorySource;
use avcplay_lib::hwaccel::recording::SurfaceKind;
use avcplay_lib::hwaccel::{
    AcceleratorCaps, Command, DecodeAccelerator, Engine, RecordingAccelerator, ResourceState,
};
use avcplay_lib::player::{load_stream, Player};
use common::*;

type TestPlayer = Player<MemorySource, RecordingAccelerator>;

fn open(params: &StreamParams, pictures: &[PictureSpec]) -> TestPlayer {
    Player::open(
        build_source(params, pictures),
        RecordingAccelerator::new(),
        PlayerConfig::default(),
    )
    .unwrap()
}

/// Tick until playback stops, submitting the presentation sync each tick
fn run_to_end(player: &mut TestPlayer, elapsed: f64, max_ticks: usize) -> usize {
    let mut ticks = 0;
    while !player.is_stopped() && ticks < max_ticks {
        player.update(elapsed).unwrap();
        if let Some(sync) = player.presentation_sync() {
            player.accelerator_mut().submit(&sync, &[]).unwrap();
        }
        ticks += 1;
    }
    ticks
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_three_frames_half_duration_ticks() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(3, 100));

    // N = 3 slots: display starts once all three frames are decoded
    for _ in 0..3 {
        player.update(0.0).unwrap();
    }
    assert!(player.is_ready());

    let mut seen = Vec::new();
    for _ in 0..6 {
        seen.push(player.display_frame_number());
        player.update(0.05).unwrap();
    }
    assert_eq!(seen, vec![0, 0, 1, 1, 2, 2]);
    assert!(player.is_stopped());
    assert_eq!(player.display_frame_number(), player.last_frame_number());
}

#[test]
fn test_exact_remaining_advances_one_frame() {
    let params = StreamParams::default();
    let pictures = vec![
        PictureSpec::idr(250),
        PictureSpec::p(1, 0, 500),
        PictureSpec::p(2, 0, 500),
    ];
    let mut player = open(&params, &pictures);
    for _ in 0..3 {
        player.update(0.0).unwrap();
    }

    let tick = player.update(0.25).unwrap();
    assert_eq!(tick.advanced, 1);
    assert_eq!(player.display_frame_number(), 1);
    assert!(!player.is_stopped());
}

#[test]
fn test_no_surface_before_ready() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(6, 100));

    assert!(player.current_display_surface().is_none());
    player.update(0.0).unwrap();
    player.update(0.0).unwrap();
    assert!(!player.is_ready());
    assert!(player.current_display_surface().is_none());

    player.update(0.0).unwrap();
    assert!(player.is_ready());
    assert!(player.current_display_surface().is_some());
}

#[test]
fn test_total_duration() {
    let params = StreamParams::default();
    let player = open(&params, &ip_sequence(4, 40));
    assert!((player.total_duration() - 0.16).abs() < 1e-9);
    assert_eq!(player.last_frame_number(), 3);
}

// ============================================================================
// Sizing
// ============================================================================

#[test]
fn test_two_reference_frames_need_five_slots() {
    let params = StreamParams {
        num_ref_frames: 2,
        ..Default::default()
    };
    let player = open(&params, &ip_sequence(3, 100));

    assert_eq!(player.stream().params.num_dpb_slots(), 5);
    let session = player.accelerator().session().unwrap();
    assert_eq!(session.max_dpb_slots, 5);
    assert_eq!(session.coded_width, 64);
    assert_eq!(session.coded_height, 48);
    assert_eq!(player.accelerator().surface_count(SurfaceKind::Dpb), 5);
}

#[test]
fn test_limited_accelerator_caps_active_references() {
    let params = StreamParams {
        num_ref_frames: 4,
        ..Default::default()
    };
    let caps = AcceleratorCaps {
        max_active_reference_pictures: 2,
        ..Default::default()
    };
    let mut player = Player::open(
        build_source(&params, &ip_sequence(12, 10)),
        RecordingAccelerator::with_caps(caps),
        PlayerConfig::default(),
    )
    .unwrap();

    run_to_end(&mut player, 0.01, 200);
    assert!(player.is_stopped());
    let max_refs = player
        .accelerator()
        .decode_requests()
        .map(|r| r.references.len())
        .max()
        .unwrap();
    assert_eq!(max_refs, 2);
}

#[test]
fn test_in_flight_bounded_by_config() {
    let params = StreamParams::default();
    let config = PlayerConfig {
        max_texture_count: 2,
        ..Default::default()
    };
    let mut player = Player::open(
        build_source(&params, &ip_sequence(8, 100)),
        RecordingAccelerator::new(),
        config,
    )
    .unwrap();

    for _ in 0..8 {
        player.update(0.0).unwrap();
    }
    assert_eq!(player.decode_frame_number(), 2);
    assert_eq!(player.accelerator().surface_count(SurfaceKind::Output), 2);
}

// ============================================================================
// Stream integrity
// ============================================================================

#[test]
fn test_truncated_nal_is_rejected() {
    let params = StreamParams::default();
    // length field claims 16 bytes, only 10 follow
    let mut sample = vec![0x00, 0x00, 0x00, 0x10];
    sample.extend(&slice_nal(&params, &PictureSpec::idr(100), 0)[..1]);
    sample.extend([0u8; 9]);

    let source = MemorySource::builder(params.width(), params.height(), 1000)
        .sps(sps_nal(&params))
        .pps(pps_nal())
        .sample(&sample, 100, true)
        .build();

    assert!(load_stream(&source).is_err());
    assert!(Player::open(source, RecordingAccelerator::new(), PlayerConfig::default()).is_err());
}

#[test]
fn test_dimension_mismatch_fails_load() {
    let params = StreamParams::default();
    // 64x48 stream in a container that claims 80x48
    let mut pictures = MemorySource::builder(80, params.height(), 1000)
        .sps(sps_nal(&params))
        .pps(pps_nal());
    for picture in ip_sequence(2, 100) {
        pictures = pictures.sample(&slice_sample(&params, &picture), 100, picture.idr);
    }
    let mismatched = pictures.build();

    let result = Player::open(mismatched, RecordingAccelerator::new(), PlayerConfig::default());
    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_non_reference_idr_stream_uses_no_references() {
    let params = StreamParams::default();
    let pictures: Vec<PictureSpec> = (0..5).map(|_| PictureSpec::idr(100).non_ref()).collect();
    let mut player = open(&params, &pictures);

    assert!(player.frames().iter().all(|f| f.reference_priority == 0));
    run_to_end(&mut player, 0.1, 100);

    let requests: Vec<_> = player.accelerator().decode_requests().collect();
    assert_eq!(requests.len(), 5);
    assert!(requests.iter().all(|r| r.references.is_empty()));
    assert!(player.orchestrator().dpb().ring().is_empty());
}

#[test]
fn test_target_never_references_itself() {
    let params = StreamParams {
        num_ref_frames: 3,
        ..Default::default()
    };
    let mut player = open(&params, &ip_sequence(20, 10));
    run_to_end(&mut player, 0.01, 500);
    assert!(player.is_stopped());

    let mut count = 0;
    for request in player.accelerator().decode_requests() {
        assert!(request.references.iter().all(|r| r.surface != request.target));
        assert!(request.references.iter().all(|r| r.slot != request.setup.slot));
        count += 1;
    }
    assert_eq!(count, 20);
}

#[test]
fn test_references_rotate_through_ring() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(5, 100));
    // four surfaces in flight, so the fifth decode is throttled
    for _ in 0..5 {
        player.update(0.0).unwrap();
    }

    let counts: Vec<usize> = player
        .accelerator()
        .decode_requests()
        .map(|r| r.references.len())
        .collect();
    // N = 3 slots hold at most two references
    assert_eq!(counts, vec![0, 1, 2, 2]);
}

// ============================================================================
// Command stream
// ============================================================================

#[test]
fn test_first_decode_resets_session() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(3, 100));
    player.update(0.0).unwrap();
    player.update(0.0).unwrap();

    let submissions = player.accelerator().submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[0].commands.contains(&Command::ResetSession));
    assert!(!submissions[1].commands.contains(&Command::ResetSession));
    assert!(submissions.iter().all(|s| s.engine == Engine::Decode));
}

#[test]
fn test_requested_reset_applies_to_next_decode() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(4, 100));
    player.update(0.0).unwrap();
    player.request_reset();
    player.update(0.0).unwrap();

    let submissions = player.accelerator().submissions();
    assert!(submissions[1].commands.contains(&Command::ResetSession));
}

#[test]
fn test_presentation_sync_after_decode() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(3, 100));
    assert!(player.presentation_sync().is_none());

    player.update(0.0).unwrap();
    let sync = player.presentation_sync().unwrap();
    assert_eq!(sync.engine, Engine::Graphics);
    assert!(sync.wait.is_some());
    assert!(matches!(sync.commands[0], Command::WaitEvent(_)));
    assert!(matches!(sync.commands[1], Command::ResetEvent(_)));
    assert!(player.presentation_sync().is_none());

    player.accelerator_mut().submit(&sync, &[]).unwrap();
}

#[test]
fn test_displayed_surface_is_shader_readable() {
    let params = StreamParams::default();
    let mut player = open(&params, &ip_sequence(4, 100));
    for _ in 0..3 {
        player.update(0.0).unwrap();
    }

    let surface = player.current_display_surface().unwrap();
    assert_eq!(
        player.accelerator().surface_state(surface),
        Some(ResourceState::SHADER_READ)
    );
}

#[test]
fn test_decode_failure_is_fatal() {
    let params = StreamParams::default();
    let mut accelerator = RecordingAccelerator::new();
    accelerator.fail_on_submission(1);
    let mut player = Player::open(
        build_source(&params, &ip_sequence(4, 100)),
        accelerator,
        PlayerConfig::default(),
    )
    .unwrap();

    player.update(0.0).unwrap();
    assert!(matches!(player.update(0.0), Err(Error::Accelerator(_))));
    assert_eq!(player.decode_frame_number(), 1);
}

// ============================================================================
// Whole stream
// ============================================================================

#[test]
fn test_full_playback_invariants() {
    let params = StreamParams {
        num_ref_frames: 2,
        ..Default::default()
    };
    let mut player = open(&params, &ip_sequence(30, 33));
    let slots = player.stream().params.num_dpb_slots() as usize;

    let mut ticks = 0;
    while !player.is_stopped() && ticks < 1000 {
        player.update(1.0 / 60.0).unwrap();
        if let Some(sync) = player.presentation_sync() {
            player.accelerator_mut().submit(&sync, &[]).unwrap();
        }
        let cursor = player.cursor();
        assert!(cursor.decode_index - cursor.play_index <= slots + 1);
        ticks += 1;
    }

    assert!(player.is_stopped());
    assert_eq!(player.decode_frame_number(), 30);
    assert_eq!(player.display_frame_number(), 29);
    // stopped players stop decoding and drop their references
    let submitted = player.accelerator().submissions().len();
    player.update(1.0).unwrap();
    assert_eq!(player.accelerator().submissions().len(), submitted);
    assert!(player.orchestrator().dpb().ring().is_empty());
}

#[test]
fn test_reordered_stream_display_order() {
    let params = StreamParams {
        poc_type: 0,
        num_ref_frames: 2,
        ..Default::default()
    };
    // decode order I0 P8 b4 P12 b10 (poc lsb in units of 2)
    let pictures = vec![
        PictureSpec::idr(100),
        PictureSpec::p(1, 8, 100),
        PictureSpec::p(2, 4, 100).non_ref().b(),
        PictureSpec::p(2, 12, 100),
        PictureSpec::p(3, 10, 100).non_ref().b(),
    ];
    let mut player = open(&params, &pictures);

    let display: Vec<u32> = player.frames().iter().map(|f| f.display_order).collect();
    assert_eq!(display, vec![0, 2, 1, 4, 3]);

    run_to_end(&mut player, 0.05, 200);
    assert!(player.is_stopped());
    assert_eq!(player.accelerator().decode_requests().count(), 5);
}

#[test]
fn test_reordered_stream_with_single_texture_budget() {
    let params = StreamParams {
        poc_type: 0,
        num_ref_frames: 2,
        ..Default::default()
    };
    let pictures = vec![
        PictureSpec::idr(100),
        PictureSpec::p(1, 8, 100),
        PictureSpec::p(2, 4, 100).non_ref().b(),
        PictureSpec::p(2, 12, 100),
        PictureSpec::p(3, 10, 100).non_ref().b(),
    ];
    let config = PlayerConfig {
        max_texture_count: 1,
        ..Default::default()
    };
    let mut player = Player::open(
        build_source(&params, &pictures),
        RecordingAccelerator::new(),
        config,
    )
    .unwrap();

    let ticks = run_to_end(&mut player, 0.05, 2000);
    assert!(player.is_stopped(), "stalled after {} ticks", ticks);
    assert_eq!(player.decode_frame_number(), 5);
    assert_eq!(player.display_frame_number(), 4);
    // one picture decoded ahead of the one on screen
    assert_eq!(player.accelerator().surface_count(SurfaceKind::Output), 2);
}
