// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the dashboard and terminal hot paths.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Smart top-up decision
//! - Trailing-window transaction count, scaling with history length
//! - Balance animation sampling
//! - Scanned payload parsing

use campus_wallet::api::TransactionRecord;
use campus_wallet::{BalanceAnimator, QrPayload, SmartTopUpPolicy, TopUpSignals, TransactionId};
use chrono::{DateTime, TimeDelta, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rust_decimal::Decimal;
use std::hint::black_box;
use std::time::{Duration, Instant};

// =============================================================================
// Helper Functions
// =============================================================================

fn history(len: usize, now: DateTime<Utc>) -> Vec<TransactionRecord> {
    (0..len)
        .map(|i| TransactionRecord {
            id: TransactionId(i as u64),
            amount: Decimal::new(-7000, 2),
            transaction_type: "deduction".to_string(),
            description: Some("Lunch".to_string()),
            venue: Some("Mess 1".to_string()),
            status: Some("success".to_string()),
            timestamp: now - TimeDelta::minutes(37 * i as i64),
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_decide(c: &mut Criterion) {
    let policy = SmartTopUpPolicy::default();
    let signals = TopUpSignals {
        projected_balance: Decimal::new(4000, 2),
        suggestion_amount: Some(Decimal::from(200)),
        hour: 14,
        recent_transactions: 3,
    };

    c.bench_function("smart_top_up_decide", |b| {
        b.iter(|| policy.decide(black_box(&signals)))
    });
}

fn bench_count_recent(c: &mut Criterion) {
    let policy = SmartTopUpPolicy::default();
    let now = Utc::now();
    let mut group = c.benchmark_group("count_recent");

    for len in [10usize, 100, 1_000, 10_000] {
        let transactions = history(len, now);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &transactions, |b, txs| {
            b.iter(|| policy.count_recent(black_box(txs), now))
        });
    }

    group.finish();
}

fn bench_animation(c: &mut Criterion) {
    let duration = Duration::from_millis(600);

    c.bench_function("animate_full_transition", |b| {
        b.iter(|| {
            let start = Instant::now();
            let mut animator = BalanceAnimator::new(duration, Decimal::from(100));
            animator.set_target(black_box(Decimal::new(15075, 2)), start);
            // One sample per 60 Hz frame.
            for frame in 0..=37u32 {
                black_box(animator.sample(start + Duration::from_millis(16) * frame));
            }
            animator.displayed()
        })
    });
}

fn bench_payload_parse(c: &mut Criterion) {
    let scanned = r#"{"user_id":1042,"token":"f3a9c1e07b","issued_at":1741600000.25,"nonce":"8d1c"}"#;

    c.bench_function("payload_parse", |b| {
        b.iter(|| QrPayload::parse(black_box(scanned)))
    });
}

criterion_group!(
    benches,
    bench_decide,
    bench_count_recent,
    bench_animation,
    bench_payload_parse
);
criterion_main!(benches);
