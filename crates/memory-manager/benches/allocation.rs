// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the allocation policies.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memory_manager::{BufferManager, ByteSize, ScopeTable};
use tensor_core::{DType, Device, Shape};

fn manager() -> BufferManager {
    BufferManager::new(ByteSize::from_mb(4), ScopeTable::default(), 2048)
        .expect("valid manager configuration")
}

fn bench_flat_alloc_free(c: &mut Criterion) {
    let mm = manager();
    let dev = Device::hexagon(0);
    let mut group = c.benchmark_group("flat_alloc_free");
    for bytes in [256usize, 4096, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(bytes), &bytes, |b, &bytes| {
            b.iter(|| {
                let id = mm.allocate_flat(dev, black_box(bytes), 64, DType::U8).unwrap();
                mm.free(id).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_scratch_tiled(c: &mut Criterion) {
    let mm = manager();
    let dev = Device::hexagon(0);
    let shape = Shape::matrix(32, 256);
    c.bench_function("scratch_alloc_free_32x256_f16", |b| {
        b.iter(|| {
            let id = mm
                .allocate_scratch(dev, black_box(&shape), DType::F16, None)
                .unwrap();
            mm.free_scratch(id).unwrap();
        })
    });
}

fn bench_address_lookup(c: &mut Criterion) {
    let mm = manager();
    let dev = Device::hexagon(0);
    let ids: Vec<_> = (0..1024)
        .map(|_| mm.allocate_flat(dev, 128, 128, DType::U8).unwrap())
        .collect();
    let addrs: Vec<_> = ids.iter().map(|id| mm.base_address(*id).unwrap()).collect();
    c.bench_function("lookup_address_1024_live", |b| {
        b.iter(|| {
            for addr in &addrs {
                black_box(mm.lookup_address(*addr).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_flat_alloc_free,
    bench_scratch_tiled,
    bench_address_lookup
);
criterion_main!(benches);
