use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use asio_buffers::{AccumulationQueue, Sample};

fn store_half(c: &mut Criterion) {
    let half: Vec<Sample> = (0..256).collect();

    c.bench_function("store 256-frame half", |b| {
        b.iter_batched(
            || AccumulationQueue::with_capacity(4096),
            |queue| {
                for _ in 0..16 {
                    queue.store(black_box(&half));
                }
                queue
            },
            BatchSize::SmallInput,
        )
    });
}

fn drain(c: &mut Criterion) {
    let half: Vec<Sample> = (0..256).collect();

    c.bench_function("fetch_all 4096 samples", |b| {
        let queue = AccumulationQueue::with_capacity(4096);
        b.iter(|| {
            for _ in 0..16 {
                queue.store(&half);
            }
            black_box(queue.fetch_all())
        })
    });

    c.bench_function("fetch_into 4096 samples", |b| {
        let queue = AccumulationQueue::with_capacity(4096);
        let mut dest = vec![0; 512];
        b.iter(|| {
            for _ in 0..16 {
                queue.store(&half);
            }
            while queue.fetch_into(&mut dest) > 0 {}
            black_box(&dest);
        })
    });
}

criterion_group!(benches, store_half, drain);
criterion_main!(benches);
