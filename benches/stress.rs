use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parkd::engine::{Engine, EngineOptions};
use parkd::model::RequestId;
use parkd::topology::{AreaSpec, TopologySpec, ZoneSpec};

/// `zones` zones in a ring, each with `areas` areas of `slots` slots.
fn city(zones: u32, areas: u32, slots: u32) -> TopologySpec {
    TopologySpec {
        zones: (1..=zones)
            .map(|z| ZoneSpec {
                id: z,
                adjacent: vec![if z == zones { 1 } else { z + 1 }],
                areas: (1..=areas)
                    .map(|a| AreaSpec {
                        id: z * 100 + a,
                        slots: (1..=slots).map(|s| (z * 100 + a) * 1000 + s).collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn engine(spec: &TopologySpec, cross_zone: bool) -> Arc<Engine> {
    Arc::new(Engine::from_spec(spec, EngineOptions { cross_zone }).expect("valid topology"))
}

async fn phase1_sequential(spec: &TopologySpec) {
    let engine = engine(spec, false);
    let zones = spec.zones.len() as u32;
    let n = 20_000;
    let mut alloc = Vec::with_capacity(n);
    let mut leave = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let zone = (i as u32 % zones) + 1;
        let t = Instant::now();
        let res = engine.allocate(&format!("SEQ{i}"), zone).await;
        alloc.push(t.elapsed());
        if let Ok(a) = res {
            let t = Instant::now();
            engine.release(a.request_id).await.expect("release allocated");
            leave.push(t.elapsed());
        }
    }

    let elapsed = start.elapsed();
    let ops = (alloc.len() + leave.len()) as f64 / elapsed.as_secs_f64();
    println!("  {n} request/leave pairs in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("request latency", &mut alloc);
    print_latency("leave latency", &mut leave);
}

async fn phase2_contention(spec: &TopologySpec) {
    let engine = engine(spec, true);
    let n_tasks = 64;
    let n_per_task = 500;
    let zones = spec.zones.len() as u32;

    let start = Instant::now();
    let handles = (0..n_tasks).map(|t| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut won = 0usize;
            let mut lost = 0usize;
            for j in 0..n_per_task {
                // Everyone hammers the same two zones.
                let zone = ((t + j) as u32 % 2).min(zones - 1) + 1;
                match engine.allocate(&format!("T{t}J{j}"), zone).await {
                    Ok(a) => {
                        won += 1;
                        if j % 3 == 0 {
                            let _ = engine.cancel(a.request_id).await;
                        } else {
                            let _ = engine.release(a.request_id).await;
                        }
                    }
                    Err(_) => lost += 1,
                }
            }
            (won, lost)
        })
    });

    let mut won = 0;
    let mut lost = 0;
    for res in join_all(handles).await {
        let (w, l) = res.expect("task panicked");
        won += w;
        lost += l;
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} requests = {total} total in {:.2}s ({won} allocated, {lost} rejected)",
        elapsed.as_secs_f64()
    );
    engine.check_invariants().await.expect("invariants hold");
}

async fn phase3_read_under_load(spec: &TopologySpec) {
    let engine = engine(spec, false);
    let zones = spec.zones.len() as u32;
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let engine = engine.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut i = 0u64;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let zone = (i as u32 % zones) + 1;
                    if let Ok(a) = engine.allocate(&format!("W{w}N{i}"), zone).await {
                        let _ = engine.release(a.request_id).await;
                    }
                    i += 1;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let readers = (0..8).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(500);
            for _ in 0..500 {
                let t = Instant::now();
                let snapshot = engine.snapshot().await;
                latencies.push(t.elapsed());
                std::hint::black_box(snapshot);
            }
            latencies
        })
    });

    let mut all = Vec::new();
    for res in join_all(readers).await {
        all.extend(res.expect("reader panicked"));
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    join_all(writers).await;

    print_latency("snapshot", &mut all);
}

async fn phase4_rollback_storm(spec: &TopologySpec) {
    let engine = engine(spec, true);
    let zones = spec.zones.len() as u32;
    let n = 5_000;

    let mut ids: Vec<RequestId> = Vec::new();
    for i in 0..n {
        let zone = (i as u32 % zones) + 1;
        if let Ok(a) = engine.allocate(&format!("R{i}"), zone).await {
            ids.push(a.request_id);
        }
    }
    for id in ids.iter().step_by(2) {
        let _ = engine.release(*id).await;
    }

    let depth = engine.undo_depth().await;
    let mut latencies = Vec::new();
    let start = Instant::now();
    loop {
        let t = Instant::now();
        match engine.rollback_many(64).await {
            Ok(_) => latencies.push(t.elapsed()),
            Err(_) => break,
        }
    }
    println!(
        "  unwound {depth} operations in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    print_latency("rollback k=64", &mut latencies);
    engine.check_invariants().await.expect("invariants hold");
    assert_eq!(engine.snapshot().await.requests.len(), 0);
}

#[tokio::main]
async fn main() {
    let spec = city(16, 4, 32);
    let slots: usize = spec
        .zones
        .iter()
        .flat_map(|z| &z.areas)
        .map(|a| a.slots.len())
        .sum();

    println!("=== parkd stress benchmark ===");
    println!("topology: {} zones, {slots} slots\n", spec.zones.len());

    println!("[phase 1] sequential request/leave throughput");
    phase1_sequential(&spec).await;

    println!("\n[phase 2] concurrent allocation contention");
    phase2_contention(&spec).await;

    println!("\n[phase 3] snapshot latency under write load");
    phase3_read_under_load(&spec).await;

    println!("\n[phase 4] rollback storm");
    phase4_rollback_storm(&spec).await;

    println!("\n=== done ===");
}
