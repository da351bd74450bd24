//! End-to-end segmentation tests

use std::path::Path;

use ffmpeg_next as ffmpeg;
use tempfile::TempDir;

use crate::config::{OutputConfig, SegmentConfig, SegmenterConfig};
use crate::error::{FfmpegError, SegmenterError};
use crate::probe::TrackSelection;
use crate::segment::{EndReason, Flow, Segmenter};
use crate::tests::fixtures::*;

fn engine(
    stream: &SyntheticStream,
    sink: RecordingSink,
    output: OutputConfig,
    config: SegmentConfig,
) -> Segmenter<RecordingSink> {
    let tracks = stream.tracks();
    let selection = TrackSelection::from_tracks(&tracks).unwrap();
    Segmenter::new(&tracks, selection, sink, output, config).unwrap()
}

fn read_playlist(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("live.m3u8")).unwrap()
}

fn segment_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".ts"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_unbounded_window_keeps_every_segment() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(35, 10).with_audio(1, 48000);
    let (sink, log) = RecordingSink::new();
    let mut segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    let mut checked_live = false;
    for packet in stream.packets() {
        assert_eq!(segmenter.push_packet(packet), Flow::Continue);
        if segmenter.segments_produced() == 3 && !checked_live {
            let text = read_playlist(dir.path());
            assert!(!text.contains("#EXT-X-ENDLIST"));
            assert_eq!(playlist_entries(&text).len(), 3);
            checked_live = true;
        }
    }
    assert!(checked_live);

    let summary = segmenter.finish().unwrap();
    assert_eq!(summary.segments_produced, 4);
    assert_eq!(summary.segments_retained, 4);
    assert_eq!(summary.media_sequence, 1);
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.dropped_packets, 0);

    let text = read_playlist(dir.path());
    assert_eq!(
        playlist_entries(&text),
        vec![
            (10, "live-1.ts".to_string()),
            (10, "live-2.ts".to_string()),
            (10, "live-3.ts".to_string()),
            (5, "live-4.ts".to_string()),
        ]
    );
    assert_eq!(playlist_tag(&text, "#EXT-X-MEDIA-SEQUENCE"), Some(1));
    assert_eq!(playlist_tag(&text, "#EXT-X-TARGETDURATION"), Some(10));
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));

    assert_eq!(
        segment_files(dir.path()),
        vec!["live-1.ts", "live-2.ts", "live-3.ts", "live-4.ts"]
    );
    assert!(!dir.path().join("live.m3u8.tmp").exists());

    let log = log.borrow();
    assert_eq!(log.headers, 4);
    assert_eq!(log.trailers, 1);
    assert_eq!(log.closes, 4);
    // every rotation flushes before closing
    assert_eq!(log.flushes, 3);
}

#[test]
fn test_bounded_window_evicts_oldest() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(35, 10);
    let (sink, _log) = RecordingSink::new();
    let mut segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 2));

    for packet in stream.packets() {
        segmenter.push_packet(packet);
        assert_playlist_consistent(&dir.path().join("live.m3u8"), dir.path());

        if segmenter.segments_produced() == 3 {
            let text = read_playlist(dir.path());
            assert_eq!(playlist_tag(&text, "#EXT-X-MEDIA-SEQUENCE"), Some(2));
            let names: Vec<_> = playlist_entries(&text).into_iter().map(|e| e.1).collect();
            assert_eq!(names, vec!["live-2.ts", "live-3.ts"]);
            assert!(!dir.path().join("live-1.ts").exists());
        }
    }

    let summary = segmenter.finish().unwrap();
    assert_eq!(summary.segments_produced, 4);
    assert_eq!(summary.segments_retained, 2);
    assert_eq!(summary.media_sequence, 3);

    let text = read_playlist(dir.path());
    assert_eq!(
        playlist_entries(&text),
        vec![(10, "live-3.ts".to_string()), (5, "live-4.ts".to_string())]
    );
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));
    assert_eq!(segment_files(dir.path()), vec!["live-3.ts", "live-4.ts"]);
}

#[test]
fn test_no_keyframe_produces_nothing() {
    let dir = TempDir::new().unwrap();
    let mut stream = SyntheticStream::video(12, 10).with_audio(1, 48000);
    stream.first_keyframe = None;
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    let summary = segmenter.run(&mut stream.source()).unwrap();
    assert_eq!(summary.segments_produced, 0);
    assert_eq!(summary.segments_retained, 0);
    assert!(log.borrow().packets.is_empty());
    assert!(!dir.path().join("live.m3u8").exists());
    assert!(segment_files(dir.path()).is_empty());
}

#[test]
fn test_packets_before_first_keyframe_dropped() {
    let dir = TempDir::new().unwrap();
    let mut stream = SyntheticStream::video(12, 10).with_audio(1, 48000);
    stream.first_keyframe = Some(50);
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    segmenter.run(&mut stream.source()).unwrap();

    let log = log.borrow();
    let first = &log.packets[0];
    assert_eq!(first.stream, 0);
    assert!(first.key);
    assert_eq!(first.pts, Some(50 * 3600));
    assert!(log.packets.iter().all(|p| p.pts.unwrap() >= 50 * 3600));

    // 2s..12s is exactly one target duration
    let text = read_playlist(dir.path());
    assert_eq!(playlist_entries(&text), vec![(10, "live-1.ts".to_string())]);
}

#[test]
fn test_segments_start_on_keyframes() {
    let dir = TempDir::new().unwrap();
    let mut stream = SyntheticStream::video(30, 1);
    stream.keyframe_every = 37;
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(4, 0));

    let summary = segmenter.run(&mut stream.source()).unwrap();
    assert!(summary.segments_produced > 1);

    let log = log.borrow();
    for path in &log.opened {
        let first = log.packets.iter().find(|p| &p.file == path).unwrap();
        assert_eq!(first.stream, 0);
        assert!(first.key, "{:?} does not start on a keyframe", path);
    }

    // boundaries land in [target - tolerance, target + keyframe interval)
    let text = read_playlist(dir.path());
    let entries = playlist_entries(&text);
    for (duration, _) in &entries[..entries.len() - 1] {
        assert!((4..=5).contains(duration), "duration {}", duration);
    }
}

#[test]
fn test_sequence_numbers_are_contiguous() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(61, 3);
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(6, 3));

    let summary = segmenter.run(&mut stream.source()).unwrap();

    let opened: Vec<_> = log
        .borrow()
        .opened
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: Vec<_> = (1..=summary.segments_produced)
        .map(|n| format!("live-{}.ts", n))
        .collect();
    assert_eq!(opened, expected);
    assert_eq!(summary.media_sequence, summary.segments_produced - 2);
}

#[test]
fn test_timestamps_rescaled_and_streams_remapped() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream {
        video_index: 2,
        video_timescale: 1000,
        ignored_index: Some(1),
        ..SyntheticStream::video(3, 1)
    }
    .with_audio(0, 48000);
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    segmenter.run(&mut stream.source()).unwrap();

    let log = log.borrow();
    assert_eq!(log.tracks.len(), 2);

    let video: Vec<_> = log.packets.iter().filter(|p| p.stream == 0).collect();
    let audio: Vec<_> = log.packets.iter().filter(|p| p.stream == 1).collect();
    assert_eq!(video.len(), 75);
    assert_eq!(video.len() + audio.len(), log.packets.len());

    assert_eq!(video[1].pts, Some(3600));
    assert_eq!(video[1].duration, 3600);
    assert_eq!(audio[0].duration, 1920);
    assert!(log.packets.iter().all(|p| p.position == -1));
}

#[test]
fn test_write_failures_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(25, 10);
    let (mut sink, _log) = RecordingSink::new();
    sink.fail_writes = true;
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    let summary = segmenter.run(&mut stream.source()).unwrap();
    assert_eq!(summary.dropped_packets, 625);
    assert_eq!(summary.segments_produced, 3);
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
}

#[test]
fn test_open_failure_stops_gracefully() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(45, 10);
    let (mut sink, _log) = RecordingSink::new();
    sink.fail_open_from = Some(3);
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    let summary = segmenter.run(&mut stream.source()).unwrap();
    assert_eq!(summary.end_reason, EndReason::OutputUnavailable);
    assert_eq!(summary.segments_produced, 2);

    let text = read_playlist(dir.path());
    assert_eq!(playlist_entries(&text).len(), 2);
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));
    assert_eq!(segment_files(dir.path()), vec!["live-1.ts", "live-2.ts"]);
}

#[test]
fn test_segment_limit_ends_run() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(35, 10);
    let (sink, log) = RecordingSink::new();
    let config = SegmentConfig {
        segment_limit: 2,
        ..segment_config(10, 0)
    };
    let mut segmenter = engine(&stream, sink, output_config(dir.path()), config);

    let mut stops = 0;
    for packet in stream.packets() {
        if segmenter.push_packet(packet) == Flow::Stop(EndReason::SegmentLimit) {
            stops += 1;
        }
    }
    assert!(stops > 0);

    let summary = segmenter.finish().unwrap();
    assert_eq!(summary.end_reason, EndReason::SegmentLimit);
    assert_eq!(summary.segments_produced, 2);
    assert_eq!(log.borrow().opened.len(), 2);

    let text = read_playlist(dir.path());
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));
}

#[test]
fn test_short_final_segment_lasts_one_second() {
    let dir = TempDir::new().unwrap();
    let mut stream = SyntheticStream::video(10, 10);
    stream.frames += 4;
    let (sink, _log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    segmenter.run(&mut stream.source()).unwrap();

    let text = read_playlist(dir.path());
    assert_eq!(
        playlist_entries(&text),
        vec![(10, "live-1.ts".to_string()), (1, "live-2.ts".to_string())]
    );
}

#[test]
fn test_read_error_treated_as_end_of_stream() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(15, 10);
    let mut source = stream.source();
    source.fail_at_end = true;
    let (sink, _log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 0));

    let summary = segmenter.run(&mut source).unwrap();
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.segments_produced, 2);
    assert!(read_playlist(dir.path()).ends_with("#EXT-X-ENDLIST\n"));
}

#[test]
fn test_video_only_input() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(5, 1);
    let (sink, log) = RecordingSink::new();
    let segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(2, 0));

    let summary = segmenter.run(&mut stream.source()).unwrap();
    assert_eq!(log.borrow().tracks.len(), 1);
    assert!(log.borrow().packets.iter().all(|p| p.stream == 0));
    assert!(summary.segments_produced >= 2);
}

#[test]
fn test_missing_input_leaves_output_untouched() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let config = SegmenterConfig::new(dir.path().join("missing.mp4"), output_config(&out));

    let result = crate::segment_file(&config);
    assert!(matches!(
        result,
        Err(SegmenterError::Ffmpeg(FfmpegError::OpenInput(_)))
    ));
    assert!(!out.exists());
}

#[test]
fn test_header_failure_removes_first_file() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(5, 1);
    let tracks = stream.tracks();
    let selection = TrackSelection::from_tracks(&tracks).unwrap();
    let (mut sink, _log) = RecordingSink::new();
    sink.fail_headers = true;

    let result = Segmenter::new(
        &tracks,
        selection,
        sink,
        output_config(dir.path()),
        segment_config(10, 0),
    );
    assert!(matches!(
        result,
        Err(SegmenterError::Ffmpeg(FfmpegError::WriteHeader(_)))
    ));
    assert!(segment_files(dir.path()).is_empty());
}

#[test]
fn test_evicted_file_outlives_failed_publish() {
    let dir = TempDir::new().unwrap();
    let stream = SyntheticStream::video(45, 10);
    let (sink, _log) = RecordingSink::new();
    let mut segmenter = engine(&stream, sink, output_config(dir.path()), segment_config(10, 1));
    let tmp = dir.path().join("live.m3u8.tmp");
    let segment = |n: u64| dir.path().join(format!("live-{}.ts", n));
    let listed = || -> Vec<String> {
        playlist_entries(&read_playlist(dir.path()))
            .into_iter()
            .map(|e| e.1)
            .collect()
    };

    let mut blocked = false;
    let mut unblocked = false;
    for packet in stream.packets() {
        segmenter.push_packet(packet);
        assert_playlist_consistent(&dir.path().join("live.m3u8"), dir.path());

        match segmenter.segments_produced() {
            1 if !blocked => {
                // a directory in place of the temp file fails the next publish
                std::fs::create_dir(&tmp).unwrap();
                blocked = true;
            }
            2 if !unblocked => {
                assert_eq!(listed(), vec!["live-1.ts"]);
                assert!(segment(1).exists());
                std::fs::remove_dir(&tmp).unwrap();
                unblocked = true;
            }
            3 => {
                assert_eq!(listed(), vec!["live-3.ts"]);
                assert!(!segment(1).exists());
                assert!(!segment(2).exists());
            }
            _ => {}
        }
    }
    assert!(unblocked);

    let summary = segmenter.finish().unwrap();
    assert_eq!(summary.segments_produced, 5);
    assert_eq!(summary.media_sequence, 5);
    assert_eq!(segment_files(dir.path()), vec!["live-5.ts"]);
}

#[test]
fn test_ffmpeg_segments_play_independently() {
    crate::ffmpeg::init().unwrap();
    let dir = TempDir::new().unwrap();
    let clip = dir.path().join("clip.ts");
    if !write_test_clip(&clip, 6, 25, 25).unwrap() {
        eprintln!("Skipping: no MPEG-2 encoder in this FFmpeg build");
        return;
    }

    let out = dir.path().join("out");
    let mut config = SegmenterConfig::new(&clip, output_config(&out));
    config.segment.target_duration_secs = 2;

    let summary = crate::segment_file(&config).unwrap();
    assert_eq!(summary.end_reason, EndReason::SourceExhausted);
    assert_eq!(summary.segments_produced, 3);
    assert_eq!(summary.dropped_packets, 0);

    let text = read_playlist(&out);
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));
    let entries = playlist_entries(&text);
    assert_eq!(entries.len(), 3);
    // 1s GOPs: every cut lands exactly on the 2s target
    assert!(entries.iter().all(|(duration, _)| *duration == 2));

    let mut video_packets = 0;
    for (_, name) in &entries {
        let path = out.join(name);
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len() % 188, 0, "{name}: partial transport packet");

        // PAT (PID 0) and PMT (PID 0x1000) precede the first elementary packet
        let pids = ts_pids(&data);
        let first_media = pids
            .iter()
            .position(|pid| (0x100..0x1000).contains(pid))
            .unwrap();
        assert!(pids[..first_media].contains(&0x0000), "{name}: no PAT");
        assert!(pids[..first_media].contains(&0x1000), "{name}: no PMT");

        let mut input = ffmpeg::format::input(&path).unwrap();
        let video = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .unwrap()
            .index();
        assert_eq!(
            input.stream(video).unwrap().time_base(),
            ffmpeg::Rational::new(1, 90000)
        );

        let mut first = true;
        for (stream, packet) in input.packets() {
            if stream.index() != video {
                continue;
            }
            if first {
                assert!(packet.is_key(), "{name} does not start on a keyframe");
                first = false;
            }
            video_packets += 1;
        }
        assert!(!first, "{name} has no video");
    }
    // nothing lost or duplicated across the file swaps
    assert_eq!(video_packets, 150);
}
