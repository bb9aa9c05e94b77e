//! USM Demux Tests
//!
//! Containers assembled in code, with and without an audio stream,
//! masked and unmasked.

mod common;

use common::UsmFixture;
use sekai_asset_core::{AssetError, CollectingSink};
use sekai_asset_cri::usm::{UsmDemuxer, UsmKey, UsmMask, extract_usm_file};
use std::fs;
use std::sync::Arc;

const KEY: u128 = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210;

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed ^ (i as u8)).collect()
}

#[test]
fn test_plain_video_and_audio() {
    let usm = UsmFixture::new("0001_op.usm", true)
        .video(0, pattern(1, 100))
        .audio(0, pattern(2, 50))
        .video(0, pattern(3, 20))
        .build();

    let streams = UsmDemuxer::default().demux(&usm).unwrap();
    assert_eq!(streams.filename, "0001_op.usm");
    assert_eq!(streams.stem(), "0001_op");
    assert_eq!(streams.video, [pattern(1, 100), pattern(3, 20)].concat());
    assert_eq!(streams.audio, Some(pattern(2, 50)));
}

#[test]
fn test_video_only_container() {
    let usm = UsmFixture::new("mv.usm", false)
        .video(0, pattern(9, 64))
        .build();

    let streams = UsmDemuxer::default().demux(&usm).unwrap();
    assert_eq!(streams.video, pattern(9, 64));
    assert!(streams.audio.is_none());
}

#[test]
fn test_masked_payloads() {
    let mask = UsmMask::new(UsmKey(KEY));

    let plain_audio = pattern(0x5A, 0x200);
    // the audio mask is a plain XOR, so applying it masks as well
    let mut masked_audio = plain_audio.clone();
    mask.unmask_audio(&mut masked_audio);

    let masked_video = pattern(0x33, 0x40 + 0x300);
    let mut expected_video = masked_video.clone();
    mask.unmask_video(&mut expected_video);

    let usm = UsmFixture::new("masked.usm", true)
        .video(0, masked_video.clone())
        .audio(0, masked_audio)
        .video(1, masked_video.clone())
        .build();

    let streams = UsmDemuxer::default()
        .with_key(UsmKey(KEY))
        .demux(&usm)
        .unwrap();

    assert_ne!(expected_video, masked_video);
    assert_eq!(streams.video, [expected_video, masked_video].concat());
    assert_eq!(streams.audio, Some(plain_audio));
}

#[test]
fn test_without_key_payloads_pass_through() {
    let payload = pattern(0x77, 0x300);
    let usm = UsmFixture::new("raw.usm", false)
        .video(0, payload.clone())
        .build();
    let streams = UsmDemuxer::default().demux(&usm).unwrap();
    assert_eq!(streams.video, payload);
}

#[test]
fn test_audio_chunk_in_video_only_container() {
    let usm = UsmFixture::new("mv.usm", false)
        .video(0, pattern(1, 16))
        .audio(0, pattern(2, 16))
        .build();

    let sink = Arc::new(CollectingSink::new());
    let streams = UsmDemuxer::default()
        .with_sink(sink.clone())
        .demux(&usm)
        .unwrap();

    assert_eq!(streams.video, pattern(1, 16));
    assert_eq!(sink.len(), 1);
    assert!(sink.entries()[0].message.contains("without an audio stream"));
}

#[test]
fn test_missing_contents_end() {
    let usm = UsmFixture::new("cut.usm", false)
        .video(0, pattern(4, 40))
        .unterminated()
        .build();

    let sink = Arc::new(CollectingSink::new());
    let streams = UsmDemuxer::default()
        .with_sink(sink.clone())
        .demux(&usm)
        .unwrap();

    assert_eq!(streams.video, pattern(4, 40));
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_broken_header_marker() {
    let mut usm = UsmFixture::new("bad.usm", false).build();
    let marker = usm
        .windows(11)
        .position(|w| w == b"#HEADER END")
        .unwrap();
    usm[marker] = b'!';

    let err = UsmDemuxer::default().demux(&usm).unwrap_err();
    assert!(matches!(err, AssetError::InvalidSignature { .. }));
}

#[test]
fn test_truncated_container() {
    let usm = UsmFixture::new("short.usm", true).build();
    let err = UsmDemuxer::default().demux(&usm[..0x30]).unwrap_err();
    assert!(err.is_container_fatal());
}

#[test]
fn test_extract_usm_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.usm");
    fs::write(
        &input,
        UsmFixture::new("story_0102.usm", true)
            .video(1, pattern(1, 32))
            .audio(1, pattern(2, 8))
            .build(),
    )
    .unwrap();

    let out = dir.path().join("out");
    let written =
        extract_usm_file(&input, &out, Some(UsmKey(KEY)), Arc::new(CollectingSink::new()))
            .unwrap();

    assert_eq!(
        written,
        vec![out.join("story_0102.m2v"), out.join("story_0102.adx")]
    );
    assert_eq!(fs::read(&written[0]).unwrap(), pattern(1, 32));
    assert_eq!(fs::read(&written[1]).unwrap(), pattern(2, 8));
}
