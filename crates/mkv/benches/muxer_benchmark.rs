use std::hint::black_box;

use bytes::Bytes;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use mkv::{
    AudioConfig, FixedUid, FrameFlags, MkvExtractor, MkvMuxer, SegmentConfig, VecSink,
    VideoConfig,
};

const GOP: usize = 30;
const GOPS: usize = 20;

fn config() -> SegmentConfig {
    SegmentConfig::new(VideoConfig::new(1280, 720, vec![0u8; 32], 33))
        .with_audio(AudioConfig::new(48000.0, vec![0x11, 0x90]))
}

/// One keyframe per GOP, two audio frames per video frame.
fn create_frames() -> Vec<(Bytes, FrameFlags)> {
    let video = Bytes::from(vec![0xABu8; 8 * 1024]);
    let audio = Bytes::from(vec![0xCDu8; 256]);

    let mut frames = Vec::with_capacity(GOP * GOPS * 3);
    for i in 0..GOP * GOPS {
        let flags = if i % GOP == 0 {
            FrameFlags::KEYFRAME
        } else {
            FrameFlags::empty()
        };
        frames.push((video.clone(), flags));
        frames.push((audio.clone(), FrameFlags::AUDIO | FrameFlags::KEYFRAME));
        frames.push((audio.clone(), FrameFlags::AUDIO | FrameFlags::KEYFRAME));
    }
    frames
}

fn mux(config: &SegmentConfig, frames: &[(Bytes, FrameFlags)]) -> VecSink {
    let mut muxer =
        MkvMuxer::with_uid_source(config, VecSink::new(), &mut FixedUid([0; 16])).unwrap();
    for (payload, flags) in frames {
        muxer.put_frame(payload.clone(), *flags).unwrap();
    }
    muxer.finalize().unwrap();
    muxer.into_sink()
}

fn benchmark_muxer(c: &mut Criterion) {
    let config = config();
    let frames = create_frames();
    let total: u64 = frames.iter().map(|(payload, _)| payload.len() as u64).sum();

    let mut group = c.benchmark_group("Muxer Performance");
    group.throughput(Throughput::Bytes(total));

    group.bench_function("put_frame (video + audio)", |b| {
        b.iter(|| black_box(mux(black_box(&config), black_box(&frames))))
    });

    group.bench_function("put_frame + flatten output", |b| {
        b.iter(|| black_box(mux(black_box(&config), black_box(&frames)).to_bytes()))
    });

    let stream = mux(&config, &frames).to_bytes();
    group.bench_function("extract frames", |b| {
        b.iter(|| {
            let extractor = MkvExtractor::new(black_box(stream.clone())).unwrap();
            black_box(extractor.frames().count())
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_muxer);
criterion_main!(benches);
