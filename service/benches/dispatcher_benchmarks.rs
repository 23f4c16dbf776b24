//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for broadcast fan-out

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use parley_service::{
    Dispatcher, OutboundMessage, ServerMetrics, Session, SessionId, SessionInbox,
    SessionRegistry,
};
use std::hint::black_box;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn room(size: usize) -> (Dispatcher, Vec<SessionInbox>) {
    let registry = Arc::new(SessionRegistry::new());
    let shutdown = CancellationToken::new();
    let inboxes = (0..size)
        .map(|i| {
            let (session, inbox) =
                Session::new(SessionId::new(i as u64 + 1), format!("user{}", i), None, 1024, &shutdown);
            registry.admit(session).unwrap();
            inbox
        })
        .collect();
    (Dispatcher::new(registry, Arc::new(ServerMetrics::new())), inboxes)
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    for size in [1usize, 10, 100, 1000] {
        let (dispatcher, mut inboxes) = room(size);
        let message = OutboundMessage::chat(SessionId::new(1), "user0", "hello everyone");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let result = dispatcher.broadcast(black_box(&message), None);
                for inbox in inboxes.iter_mut() {
                    while inbox.try_recv().is_ok() {}
                }
                black_box(result)
            });
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let (dispatcher, _inboxes) = room(1000);
    c.bench_function("registry_snapshot_1000", |b| {
        b.iter(|| black_box(dispatcher.registry().snapshot()))
    });
}

criterion_group!(benches, bench_broadcast, bench_snapshot);
criterion_main!(benches);
