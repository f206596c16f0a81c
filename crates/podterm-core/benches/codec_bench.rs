//! Criterion benchmarks for the JSON frame codec and the replay buffer.
//!
//! Every keystroke is one `stdin` frame and every burst of remote output is
//! one `stdout` frame, so both directions sit on the interactive hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package podterm-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use podterm_core::{decode, encode, Frame, Geometry, ReplayBuffer};

// ── Frame fixtures ────────────────────────────────────────────────────────────

fn make_keystroke() -> Frame {
    Frame::stdin("l", Geometry::DEFAULT)
}

fn make_paste() -> Frame {
    Frame::stdin("kubectl get pods -o wide\n".repeat(8), Geometry::DEFAULT)
}

fn make_resize() -> Frame {
    Frame::resize(Geometry::new(50, 200).unwrap_or_default())
}

fn make_output_line() -> Frame {
    Frame::stdout("drwxr-xr-x  2 root root 4096 Jan  1 00:00 etc\r\n")
}

fn make_output_screen() -> Frame {
    Frame::stdout("\x1b[32mINFO\x1b[0m request served in 3ms\r\n".repeat(50))
}

fn fixtures() -> Vec<(&'static str, Frame)> {
    vec![
        ("stdin_key", make_keystroke()),
        ("stdin_paste", make_paste()),
        ("resize", make_resize()),
        ("stdout_line", make_output_line()),
        ("stdout_screen", make_output_screen()),
    ]
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, frame) in fixtures() {
        group.bench_with_input(BenchmarkId::new("frame", name), &frame, |b, frame| {
            b.iter(|| encode(black_box(frame)).expect("encode must succeed"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, frame) in fixtures() {
        let text = encode(&frame).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("frame", name), &text, |b, text| {
            b.iter(|| decode(black_box(text.as_bytes())).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Steady-state push into a full buffer with one live subscriber.
fn bench_replay_push(c: &mut Criterion) {
    let mut buffer: ReplayBuffer<Frame> = ReplayBuffer::with_capacity(100);
    buffer.subscribe(Box::new(|frame: &Frame| {
        black_box(frame.data.as_ref().map_or(0, String::len));
    }));
    for _ in 0..100 {
        buffer.push(make_output_line());
    }

    let line = make_output_line();
    c.bench_function("replay_push_full", |b| {
        b.iter(|| buffer.push(black_box(line.clone())))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_replay_push);
criterion_main!(benches);
