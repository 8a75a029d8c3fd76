use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use vendo_core::StaticLabel;
use vendo_pricing::{ContractPriceService, OrderPrices, PriceAggregator, PriceKind, PriceLine};

fn sample_lines(count: usize) -> Vec<PriceLine> {
    (0..count)
        .map(|i| {
            let kind = match i % 4 {
                0 => PriceKind::Sale,
                1 => PriceKind::Freight,
                2 => PriceKind::Marketing,
                _ => PriceKind::Original,
            };
            let money = Decimal::new(100 + i as i64, 2);
            let currency = if i % 7 == 0 { "GOLD" } else { "CNY" };
            PriceLine::new(kind, "商品", money).with_currency(currency)
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    for size in [16usize, 256, 4096] {
        let lines = sample_lines(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("add_{size}_lines"), |b| {
            b.iter(|| {
                let mut agg = PriceAggregator::new();
                for line in &lines {
                    agg.add_line(black_box(line));
                }
                black_box(agg.total("CNY"))
            })
        });
    }
    group.finish();
}

fn bench_order_views(c: &mut Criterion) {
    let service = ContractPriceService::new(Arc::new(StaticLabel::new("免费")));
    let lines = sample_lines(256);
    let invalid = HashSet::new();

    c.bench_function("type_totals_256_lines", |b| {
        b.iter(|| {
            let prices = OrderPrices::new(black_box(&lines), &invalid);
            black_box(service.type_totals(prices).total())
        })
    });

    c.bench_function("display_price_256_lines", |b| {
        b.iter(|| {
            let prices = OrderPrices::new(black_box(&lines), &invalid);
            black_box(service.display_price(prices))
        })
    });
}

criterion_group!(benches, bench_aggregation, bench_order_views);
criterion_main!(benches);
