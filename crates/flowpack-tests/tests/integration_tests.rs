//! Integration tests for flowpack
//!
//! These tests exercise the public stream surface end to end: round trips
//! across every codec and container format, lifecycle behavior, push-back
//! positioning for concatenated streams, and endpoints that transfer only
//! a few bytes at a time.

use flowpack_compression::{CompressorStream, FormatSpec};
use flowpack_io::{Endpoint, FileEndpoint, MemoryEndpoint};
use flowpack_tests::test_utils::{mixed_payload, TrickleEndpoint};
use flowpack_types::{ContainerFormat, Direction, StreamState};

use proptest::prelude::*;
use tempfile::TempDir;

/// Compress `chunks` through a fresh stream into a memory endpoint
fn compress_to_memory(spec: FormatSpec, chunks: &[&[u8]], flush_between: bool) -> MemoryEndpoint {
    let mut endpoint = MemoryEndpoint::new();
    {
        let mut stream = CompressorStream::new(&mut endpoint, spec);
        stream.open(Direction::Write).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            stream.write(chunk).unwrap();
            if flush_between && i + 1 < chunks.len() {
                stream.flush().unwrap();
            }
        }
        stream.close();
    }
    endpoint
}

/// Decompress everything from `endpoint`, reading `chunk` bytes at a time
fn decompress_all<E: Endpoint>(endpoint: E, spec: FormatSpec, chunk: usize) -> Vec<u8> {
    let mut stream = CompressorStream::new(endpoint, spec);
    stream.open(Direction::Read).unwrap();

    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    stream.close();
    out
}

fn deflate_formats() -> [ContainerFormat; 3] {
    [
        ContainerFormat::Raw,
        ContainerFormat::Zlib,
        ContainerFormat::Gzip,
    ]
}

#[test]
fn test_deflate_round_trip_all_formats_and_levels() {
    let payload = mixed_payload(32 * 1024);

    for container in deflate_formats() {
        for level in [0, 1, 6, 9] {
            let spec = FormatSpec::deflate(container, level).unwrap();
            let endpoint = compress_to_memory(spec, &[payload.as_slice()], false);
            let restored = decompress_all(
                MemoryEndpoint::from_bytes(endpoint.as_slice()),
                spec,
                4096,
            );
            assert_eq!(
                restored, payload,
                "round trip failed for {:?} level {}",
                container, level
            );
        }
    }
}

#[test]
fn test_frame_streaming_round_trip_levels() {
    let payload = mixed_payload(32 * 1024);

    for level in [1, 3, 19] {
        let spec = FormatSpec::frame_streaming(level).unwrap();
        let endpoint = compress_to_memory(spec, &[payload.as_slice()], false);
        let restored = decompress_all(
            MemoryEndpoint::from_bytes(endpoint.as_slice()),
            spec,
            4096,
        );
        assert_eq!(restored, payload, "round trip failed for frame level {}", level);
    }
}

#[test]
fn test_quick_brown_fox_gzip_scenario() {
    let spec = FormatSpec::gzip(6).unwrap();
    let mut endpoint = MemoryEndpoint::new();
    {
        let mut stream = CompressorStream::new(&mut endpoint, spec);
        stream.open(Direction::Write).unwrap();
        stream.write(b"The quick brown fox").unwrap();
        stream.close();
    }

    // The bytes on the endpoint are a well-formed gzip member.
    assert_eq!(&endpoint.as_slice()[..2], &[0x1f, 0x8b]);

    let mut source = MemoryEndpoint::from_bytes(endpoint.as_slice());
    let mut stream = CompressorStream::new(&mut source, spec);
    stream.open(Direction::Read).unwrap();

    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"The quick brown fox");
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_chunked_reads_equal_single_read() {
    let payload = mixed_payload(10_000);

    for spec in [
        FormatSpec::zlib(6).unwrap(),
        FormatSpec::gzip(6).unwrap(),
        FormatSpec::frame_streaming(3).unwrap(),
    ] {
        let endpoint = compress_to_memory(spec, &[payload.as_slice()], false);
        let whole = decompress_all(
            MemoryEndpoint::from_bytes(endpoint.as_slice()),
            spec,
            payload.len() + 64,
        );

        for chunk in [1, 2, 7, 64] {
            let piecewise = decompress_all(
                MemoryEndpoint::from_bytes(endpoint.as_slice()),
                spec,
                chunk,
            );
            assert_eq!(piecewise, whole, "chunk size {} diverged", chunk);
        }
        assert_eq!(whole, payload);
    }
}

#[test]
fn test_flush_then_continue_round_trips() {
    let part1 = mixed_payload(5_000);
    let part2 = mixed_payload(7_777);
    let mut expected = part1.clone();
    expected.extend_from_slice(&part2);

    for spec in [
        FormatSpec::zlib(6).unwrap(),
        FormatSpec::gzip(6).unwrap(),
        FormatSpec::frame_streaming(3).unwrap(),
    ] {
        let flushed = compress_to_memory(spec, &[part1.as_slice(), part2.as_slice()], true);
        let unflushed = compress_to_memory(spec, &[part1.as_slice(), part2.as_slice()], false);

        // The sync point typically costs bytes; the content must not change.
        let restored =
            decompress_all(MemoryEndpoint::from_bytes(flushed.as_slice()), spec, 4096);
        assert_eq!(restored, expected);

        let restored =
            decompress_all(MemoryEndpoint::from_bytes(unflushed.as_slice()), spec, 4096);
        assert_eq!(restored, expected);
    }
}

#[test]
fn test_end_of_stream_push_back_positions_endpoint() {
    let first = mixed_payload(4_096);
    let second = mixed_payload(2_048);

    for spec in [
        FormatSpec::raw_deflate(6).unwrap(),
        FormatSpec::zlib(6).unwrap(),
        FormatSpec::gzip(6).unwrap(),
        FormatSpec::frame_streaming(3).unwrap(),
    ] {
        let first_bytes = compress_to_memory(spec, &[first.as_slice()], false);
        let second_bytes = compress_to_memory(spec, &[second.as_slice()], false);

        let mut concatenated = first_bytes.as_slice().to_vec();
        concatenated.extend_from_slice(second_bytes.as_slice());
        let mut endpoint = MemoryEndpoint::from_bytes(&concatenated);

        {
            let mut stream = CompressorStream::new(&mut endpoint, spec);
            stream.open(Direction::Read).unwrap();
            let mut out = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
            assert_eq!(out, first);
            assert_eq!(stream.state(), StreamState::EndOfStream);
            stream.close();
        }

        // The next reader starts exactly at the second stream's first byte.
        assert_eq!(
            endpoint.remaining(),
            second_bytes.as_slice().len(),
            "push-back left the wrong position for {:?}",
            spec.codec()
        );

        let restored = decompress_all(&mut endpoint, spec, 1024);
        assert_eq!(restored, second);
    }
}

#[test]
fn test_empty_write_touches_nothing_and_close_is_idempotent() {
    let mut endpoint = MemoryEndpoint::new();
    let mut stream = CompressorStream::new(&mut endpoint, FormatSpec::gzip(6).unwrap());
    stream.open(Direction::Write).unwrap();

    assert_eq!(stream.write(&[]).unwrap(), 0);
    assert_eq!(stream.state(), StreamState::NoBytesWritten);

    stream.close();
    stream.close();
    drop(stream);

    assert!(endpoint.as_slice().is_empty());
}

#[test]
fn test_corrupt_gzip_checksum_is_detected() {
    let payload = mixed_payload(2_000);
    let spec = FormatSpec::gzip(6).unwrap();
    let endpoint = compress_to_memory(spec, &[payload.as_slice()], false);

    // Flip one byte inside the CRC-32 trailer.
    let mut corrupted = endpoint.as_slice().to_vec();
    let crc_offset = corrupted.len() - 8;
    corrupted[crc_offset] ^= 0x01;

    let mut source = MemoryEndpoint::from_bytes(&corrupted);
    let mut stream = CompressorStream::new(&mut source, spec);
    stream.open(Direction::Read).unwrap();

    let mut buf = [0u8; 512];
    let mut outcome = Ok(0);
    for _ in 0..=corrupted.len() {
        outcome = stream.read(&mut buf);
        match outcome {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }

    assert!(outcome.is_err());
    assert_eq!(stream.state(), StreamState::Error);
    assert!(stream.error_description().is_some());
}

#[test]
fn test_short_write_endpoint_still_receives_full_stream() {
    let payload = mixed_payload(20_000);
    let spec = FormatSpec::gzip(6).unwrap();

    let mut endpoint = TrickleEndpoint::new(3);
    {
        let mut stream = CompressorStream::new(&mut endpoint, spec);
        stream.open(Direction::Write).unwrap();
        stream.write(&payload).unwrap();
        stream.close();
    }

    let source = TrickleEndpoint::from_bytes(endpoint.as_slice(), 5);
    let restored = decompress_all(source, spec, 513);
    assert_eq!(restored, payload);
}

#[test]
fn test_file_endpoint_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payload.gz");
    let payload = mixed_payload(12_345);
    let spec = FormatSpec::gzip(6).unwrap();

    {
        let mut stream = CompressorStream::new(FileEndpoint::new(&path), spec);
        stream.open(Direction::Write).unwrap();
        stream.write(&payload).unwrap();
        stream.close();
    }

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(&on_disk[..2], &[0x1f, 0x8b]);

    let restored = decompress_all(FileEndpoint::new(&path), spec, 4096);
    assert_eq!(restored, payload);
}

#[test]
fn test_pre_opened_endpoint_is_left_open() {
    let mut endpoint = MemoryEndpoint::new();
    endpoint.open(Direction::Write).unwrap();

    {
        let mut stream = CompressorStream::new(&mut endpoint, FormatSpec::zlib(6).unwrap());
        stream.open(Direction::Write).unwrap();
        stream.write(b"who closes the endpoint").unwrap();
        stream.close();
    }

    // The stream did not open the endpoint, so it must not close it.
    assert!(endpoint.is_open());
    endpoint.close();
}

#[test]
fn test_direction_mismatch_with_pre_opened_endpoint() {
    let mut endpoint = MemoryEndpoint::from_bytes(b"seed");
    endpoint.open(Direction::Read).unwrap();

    let mut stream = CompressorStream::new(&mut endpoint, FormatSpec::zlib(6).unwrap());
    assert!(stream.open(Direction::Write).is_err());
    assert!(!stream.is_open());
    assert!(stream.error_description().is_some());
}

proptest! {
    #[test]
    fn prop_round_trip_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
        for spec in [
            FormatSpec::zlib(6).unwrap(),
            FormatSpec::frame_streaming(3).unwrap(),
        ] {
            let endpoint = compress_to_memory(spec, &[payload.as_slice()], false);
            let restored = decompress_all(
                MemoryEndpoint::from_bytes(endpoint.as_slice()),
                spec,
                257,
            );
            prop_assert_eq!(&restored, &payload);
        }
    }
}
