//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to give each of them a quota."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: part middle manager, part helicopter parent. It sizes the
//! crew, hands out quotas, wires the channels, and waits for everyone to go home.
//!
//! 🧠 Knowledge graph:
//! ```text
//!   SourceWorker ──▶ [distribution: bounded(queue_capacity)] ──▶ FilterWorker × N
//!                                                                    │
//!   caller ◀── SinkWorker ◀── [result: bounded(min(total_items, cap))] ◀┘
//!                                   ▲
//!                  RunningPool::close() is the only one who closes this
//! ```
//! - Workers are registered with the pool BEFORE the source starts.
//! - The source learns about early completion through the pool's `done` token.
//! - The sink drains on the caller's task while the pool's close runs on its own task,
//!   so a full result buffer never wedges a worker.

mod pool;
mod workers;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::{FileSource, SourceBackend};
use crate::common::{Category, FilterRequest, Pokemon};

pub use pool::{RunningPool, WorkerPool};
pub use workers::{FilterWorker, Worker, WorkerReport, WorkerState};
use workers::{SinkWorker, SourceWorker};

/// 🪪 Who a worker is and what it's allowed to do. Immutable once the plan is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerDescriptor {
    /// 1-based, in plan order
    pub id: usize,
    pub quota: usize,
    pub category: Category,
}

/// 📐 Size the crew: `ceil(total_items / items_per_worker)` workers, quotas handed out
/// greedily so they sum to exactly `total_items` and none exceeds `items_per_worker`.
///
/// Zero on either side means nobody gets hired. No validation beyond that, on purpose:
/// `total_items < items_per_worker` simply yields one worker with quota `total_items`.
pub fn plan_workers(
    category: Category,
    total_items: usize,
    items_per_worker: usize,
) -> Vec<WorkerDescriptor> {
    if total_items == 0 || items_per_worker == 0 {
        return Vec::new();
    }

    let mut plan = Vec::new();
    let mut assigned = 0usize;
    while assigned < total_items {
        let quota = items_per_worker.min(total_items - assigned);
        plan.push(WorkerDescriptor {
            id: plan.len() + 1,
            quota,
            category,
        });
        assigned += quota;
    }
    plan
}

/// 📋 Everything one run produced: the pokemon, plus how each worker fared.
#[derive(Debug, Clone, Serialize)]
pub struct FilterReport {
    /// in arrival order, which is whatever order the workers raced them in
    pub pokemons: Vec<Pokemon>,
    pub workers: Vec<WorkerReport>,
    /// 📤 raw records the source managed to hand to the workers before it stopped
    pub rows_forwarded: u64,
}

/// 🚀 Run one pipeline over any source backend.
///
/// The source is already open by the time we get here, so the only failures left are
/// our own tasks dying, which would be a bug.
///
/// The result buffer holds at most `runtime.result_buffer_cap` pokemon. The sink drains
/// it while the workers run, so a smaller buffer only means workers wait their turn.
pub async fn run_pipeline(
    source: SourceBackend,
    request: FilterRequest,
    runtime: &RuntimeConfig,
) -> Result<FilterReport> {
    let plan = plan_workers(request.category, request.total_items, request.items_per_worker);
    info!(
        "📐 filtering {} {} records with {} workers ({} per worker)",
        request.total_items,
        request.category,
        plan.len(),
        request.items_per_worker
    );

    // -- 📬 bounded channels allocate every slot up front, so never size one off the request alone
    let result_capacity = request.total_items.min(runtime.result_buffer_cap).max(1);
    let (record_tx, record_rx) = async_channel::bounded(runtime.queue_capacity.max(1));
    let (result_tx, result_rx) = async_channel::bounded(result_capacity);
    let done = CancellationToken::new();

    // -- 🧑‍🤝‍🧑 registration must be complete before anything runs
    let mut pool = WorkerPool::new(record_rx, result_tx, done.clone());
    for descriptor in plan {
        pool.add_worker(FilterWorker::new(descriptor));
    }
    let running = pool.run();

    let source_handle = SourceWorker::new(source, record_tx, done).start();
    let closer = tokio::spawn(running.close());

    let pokemons = SinkWorker::new(result_rx).drain().await;

    let workers = closer
        .await
        .context("💀 the pool's close task died before closing the result channel")?;
    let rows_forwarded = source_handle
        .await
        .context("💀 the source task died mid-scan")?;

    debug!(
        "🏁 run finished: {} results, {} rows forwarded",
        pokemons.len(),
        rows_forwarded
    );
    Ok(FilterReport {
        pokemons,
        workers,
        rows_forwarded,
    })
}

/// 📦 The Supervisor: owns the config, opens the store, runs the pipeline.
#[derive(Debug, Clone)]
pub struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🎯 One filter run against the configured store. Just the pokemon, please.
    pub async fn filter(&self, request: FilterRequest) -> Result<Vec<Pokemon>> {
        Ok(self.filter_with_report(request).await?.pokemons)
    }

    /// 📋 One filter run, with the per-worker paperwork.
    ///
    /// Fails up front (no partial result) if the store can't be opened. The `DexError::Io`
    /// inside survives the context and can be downcast by the caller.
    pub async fn filter_with_report(&self, request: FilterRequest) -> Result<FilterReport> {
        let store = &self.app_config.store.file_name;
        let source = FileSource::open(store, self.app_config.runtime.show_progress)
            .await
            .with_context(|| format!("💀 could not start filtering, store '{}' would not open", store.display()))?;

        run_pipeline(SourceBackend::File(source), request, &self.app_config.runtime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemorySource;
    use crate::errors::DexError;
    use std::collections::HashSet;
    use std::io::Write;

    fn quotas(total: usize, per_worker: usize) -> Vec<usize> {
        plan_workers(Category::Even, total, per_worker)
            .into_iter()
            .map(|d| d.quota)
            .collect()
    }

    #[test]
    fn the_one_where_five_items_two_per_worker_needs_three_workers() {
        let plan = plan_workers(Category::Odd, 5, 2);
        assert_eq!(plan.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(quotas(5, 2), vec![2, 2, 1]);
        assert!(plan.iter().all(|d| d.category == Category::Odd));
    }

    #[test]
    fn the_one_where_quotas_always_add_up() {
        for total in 1..=40 {
            for per_worker in 1..=total {
                let q = quotas(total, per_worker);
                assert_eq!(q.len(), total.div_ceil(per_worker), "count for {total}/{per_worker}");
                assert_eq!(q.iter().sum::<usize>(), total, "sum for {total}/{per_worker}");
                assert!(q.iter().all(|&quota| quota >= 1 && quota <= per_worker));
            }
        }
    }

    #[test]
    fn the_one_where_the_edges_of_the_plan_behave() {
        assert_eq!(quotas(3, 3), vec![3]);
        assert_eq!(quotas(3, 5), vec![3]);
        assert!(quotas(0, 5).is_empty());
        assert!(quotas(5, 0).is_empty());
    }

    fn runtime(queue_capacity: usize) -> RuntimeConfig {
        RuntimeConfig {
            queue_capacity,
            ..RuntimeConfig::default()
        }
    }

    fn request(category: Category, total_items: usize, items_per_worker: usize) -> FilterRequest {
        FilterRequest {
            category,
            total_items,
            items_per_worker,
        }
    }

    #[tokio::test]
    async fn the_one_where_one_worker_finds_the_first_three_evens() {
        let report = run_pipeline(
            SourceBackend::InMemory(InMemorySource::with_ids(10)),
            request(Category::Even, 3, 3),
            &runtime(10),
        )
        .await
        .expect("pipeline runs");

        assert_eq!(report.workers.len(), 1);
        assert_eq!(report.workers[0].quota, 3);
        assert_eq!(report.workers[0].state, WorkerState::QuotaMet);
        // -- a single worker reads in order, so this one is deterministic
        let ids: Vec<u64> = report.pokemons.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4, 6]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_many_workers_share_the_load() {
        let report = run_pipeline(
            SourceBackend::InMemory(InMemorySource::with_ids(200)),
            request(Category::Odd, 25, 4),
            &runtime(8),
        )
        .await
        .expect("pipeline runs");

        assert_eq!(report.workers.len(), 7);
        assert_eq!(report.pokemons.len(), 25);
        assert!(report.pokemons.iter().all(|p| p.id % 2 == 1));
        let unique: HashSet<u64> = report.pokemons.iter().map(|p| p.id).collect();
        assert_eq!(unique.len(), 25, "no record is delivered twice");
        assert!(report.workers.iter().all(|w| w.state.is_terminal()));
        assert_eq!(report.workers.iter().map(|w| w.accepted).sum::<usize>(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_there_are_not_enough_matches_to_go_around() {
        let report = run_pipeline(
            SourceBackend::InMemory(InMemorySource::with_ids(9)),
            request(Category::Even, 10, 3),
            &runtime(2),
        )
        .await
        .expect("pipeline runs");

        let mut ids: Vec<u64> = report.pokemons.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4, 6, 8]);
        assert!(report.workers.iter().any(|w| w.state == WorkerState::Exhausted));
        assert_eq!(report.rows_forwarded, 9);
    }

    #[tokio::test]
    async fn the_one_where_a_non_numeric_id_is_quietly_skipped() {
        let source = InMemorySource::new([
            "id,number,name,image_url,abilities",
            "1,1,bulbasaur,img,overgrow",
            "2,2,ivysaur,img,overgrow",
            "X,3,missingno,img,glitch",
            "4,4,charmander,img,blaze",
            "5,5,charmeleon,img,blaze",
            "6,6,charizard,img,blaze",
        ]);
        let report = run_pipeline(SourceBackend::InMemory(source), request(Category::Even, 3, 1), &runtime(4))
            .await
            .expect("a bad row is not a failed run");

        let mut names: Vec<String> = report.pokemons.into_iter().map(|p| p.name).collect();
        names.sort();
        assert_eq!(names, vec!["charizard", "charmander", "ivysaur"]);
    }

    #[tokio::test]
    async fn the_one_where_zero_items_means_zero_workers_and_an_empty_result() {
        let report = run_pipeline(
            SourceBackend::InMemory(InMemorySource::with_ids(50)),
            request(Category::Even, 0, 3),
            &runtime(4),
        )
        .await
        .expect("pipeline runs");

        assert!(report.workers.is_empty());
        assert!(report.pokemons.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_the_source_stops_once_every_quota_is_met() {
        let report = run_pipeline(
            SourceBackend::InMemory(InMemorySource::with_ids(100_000)),
            request(Category::Even, 4, 2),
            &runtime(2),
        )
        .await
        .expect("pipeline runs");

        assert_eq!(report.pokemons.len(), 4);
        assert!(
            report.rows_forwarded < 100,
            "source kept feeding {} rows after every worker left",
            report.rows_forwarded
        );
    }

    #[tokio::test]
    async fn the_one_where_the_supervisor_reads_a_real_file() {
        let mut store = tempfile::NamedTempFile::new().expect("💀 temp store");
        writeln!(store, "id,number,name,image_url,abilities").expect("write");
        for id in 1..=10 {
            writeln!(store, "{id},{id},mon-{id},img,\"a,b\"").expect("write");
        }

        let supervisor = Supervisor::new(AppConfig::for_store(store.path()));
        let pokemons = supervisor
            .filter(FilterRequest::new(Category::Odd, 2, 2).expect("valid"))
            .await
            .expect("filter runs");

        assert_eq!(pokemons.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(pokemons[0].abilities, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_store_fails_the_whole_run() {
        let dir = tempfile::tempdir().expect("💀 temp dir");
        let supervisor = Supervisor::new(AppConfig::for_store(dir.path().join("gone.csv")));

        let err = supervisor
            .filter(FilterRequest::new(Category::Even, 2, 1).expect("valid"))
            .await
            .expect_err("no store, no run");
        assert!(matches!(err.downcast_ref::<DexError>(), Some(DexError::Io { .. })));
    }

    #[tokio::test]
    async fn the_one_where_a_blank_first_line_doesnt_hide_the_whole_store() {
        let source = InMemorySource::new([
            "",
            "id,number,name,image_url,abilities",
            "2,2,ivysaur,img,overgrow",
            "4,4,charmander,img,blaze",
        ]);
        let report = run_pipeline(SourceBackend::InMemory(source), request(Category::Even, 2, 2), &runtime(4))
            .await
            .expect("pipeline runs");

        let ids: Vec<u64> = report.pokemons.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn the_one_where_a_huge_request_doesnt_reserve_a_huge_buffer() {
        let huge = 1usize << 40;
        let request = FilterRequest::new(Category::Even, huge, huge).expect("valid on paper");
        let runtime = RuntimeConfig {
            result_buffer_cap: 2,
            ..RuntimeConfig::default()
        };

        let report = run_pipeline(SourceBackend::InMemory(InMemorySource::with_ids(10)), request, &runtime)
            .await
            .expect("pipeline runs");

        assert_eq!(report.workers.len(), 1);
        assert_eq!(report.workers[0].state, WorkerState::Exhausted);
        let ids: Vec<u64> = report.pokemons.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 4, 6, 8, 10]);
    }
}
