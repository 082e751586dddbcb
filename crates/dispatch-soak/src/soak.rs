//! Soak run: producers, consumers and an evictor sharing one heap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver};
use dispatch_heap::{HeapConfig, HeapStats, PriorityHeap};
use dispatch_models::Job;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Result, SoakError};

/// Shape of a soak run.
#[derive(Debug, Clone)]
pub struct SoakPlan {
    pub producers: usize,
    pub consumers: usize,
    pub jobs_per_producer: u64,
    pub groups: u64,
    /// Interval between group evictions; `None` disables eviction.
    pub evict_every: Option<Duration>,
    pub deadline: Duration,
}

impl SoakPlan {
    pub fn total_jobs(&self) -> u64 {
        self.producers as u64 * self.jobs_per_producer
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SoakReport {
    pub produced: u64,
    pub consumed: u64,
    pub evicted: u64,
    /// Times a consumer saw a lower priority than the one before it.
    pub inversions: u64,
    pub elapsed_ms: u128,
    pub heap: HeapStats,
}

#[derive(Default)]
struct Tally {
    consumed: AtomicU64,
    evicted: AtomicU64,
    inversions: AtomicU64,
}

impl Tally {
    fn settled(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst) + self.evicted.load(Ordering::SeqCst)
    }
}

fn group_name(index: u64) -> String {
    format!("group-{index}")
}

/// Runs `plan` against a fresh heap built from `config`.
///
/// Returns once every produced job has been either consumed or evicted, and
/// the heap has been shut down.
pub fn run(config: HeapConfig, plan: &SoakPlan) -> Result<SoakReport> {
    let started = Instant::now();
    let heap = Arc::new(PriorityHeap::new(config)?);
    let tally = Arc::new(Tally::default());
    let (done_tx, done_rx) = bounded::<()>(0);

    info!(
        producers = plan.producers,
        consumers = plan.consumers,
        jobs = plan.total_jobs(),
        max_len = heap.max_len(),
        "starting soak run"
    );

    let consumers: Vec<_> = (0..plan.consumers)
        .map(|_| spawn_consumer(heap.extract_min_channel(), done_rx.clone(), Arc::clone(&tally)))
        .collect();

    let evictor = plan.evict_every.map(|every| {
        spawn_evictor(
            Arc::clone(&heap),
            every,
            plan.groups,
            done_rx.clone(),
            Arc::clone(&tally),
        )
    });

    let producers: Vec<_> = (0..plan.producers)
        .map(|p| spawn_producer(Arc::clone(&heap), p as u64, plan.jobs_per_producer, plan.groups))
        .collect();

    let produced = plan.total_jobs();
    let deadline = started + plan.deadline;
    let mut producers = producers;
    loop {
        if !producers.is_empty() {
            producers = join_finished(producers, "producer")?;
            if producers.is_empty() {
                debug!(resident = heap.len(), "all producers finished");
            }
        }
        if producers.is_empty() && tally.settled() >= produced {
            break;
        }
        if Instant::now() >= deadline {
            warn!(settled = tally.settled(), produced, "soak deadline reached");
            drop(done_tx);
            heap.shutdown()?;
            return Err(SoakError::Deadline {
                settled: tally.settled(),
                produced,
            });
        }
        thread::sleep(Duration::from_millis(5));
    }

    drop(done_tx);
    for consumer in consumers {
        consumer
            .join()
            .map_err(|_| SoakError::WorkerPanicked("consumer"))?;
    }
    if let Some(evictor) = evictor {
        evictor
            .join()
            .map_err(|_| SoakError::WorkerPanicked("evictor"))?;
    }
    heap.shutdown()?;

    let report = SoakReport {
        produced,
        consumed: tally.consumed.load(Ordering::SeqCst),
        evicted: tally.evicted.load(Ordering::SeqCst),
        inversions: tally.inversions.load(Ordering::SeqCst),
        elapsed_ms: started.elapsed().as_millis(),
        heap: heap.stats(),
    };
    info!(
        consumed = report.consumed,
        evicted = report.evicted,
        elapsed_ms = report.elapsed_ms as u64,
        "soak run finished"
    );
    Ok(report)
}

/// Joins the handles that have finished and returns the rest.
fn join_finished(
    handles: Vec<JoinHandle<()>>,
    role: &'static str,
) -> Result<Vec<JoinHandle<()>>> {
    let mut running = Vec::with_capacity(handles.len());
    for handle in handles {
        if handle.is_finished() {
            handle.join().map_err(|_| SoakError::WorkerPanicked(role))?;
        } else {
            running.push(handle);
        }
    }
    Ok(running)
}

fn spawn_producer(
    heap: Arc<PriorityHeap<Job>>,
    producer: u64,
    jobs: u64,
    groups: u64,
) -> JoinHandle<()> {
    thread::spawn(move || {
        // Cheap LCG so runs are reproducible without an RNG dependency.
        let mut seed = producer.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
        for n in 0..jobs {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let priority = ((seed >> 33) % 10_000) as i64;
            let job = Job::new(group_name((producer + n) % groups), priority)
                .with_id(format!("p{producer}-{n}"))
                .with_payload(json!({ "producer": producer, "seq": n }));
            heap.insert(job);
        }
    })
}

fn spawn_consumer(jobs: Receiver<Job>, done: Receiver<()>, tally: Arc<Tally>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut last = i64::MIN;
        loop {
            select! {
                recv(jobs) -> job => match job {
                    Ok(job) => {
                        if job.payload.get("seq").is_none() {
                            warn!(id = %job.id, "job arrived without a sequence number");
                        }
                        if job.priority < last {
                            tally.inversions.fetch_add(1, Ordering::SeqCst);
                        }
                        last = job.priority;
                        tally.consumed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }
    })
}

fn spawn_evictor(
    heap: Arc<PriorityHeap<Job>>,
    every: Duration,
    groups: u64,
    done: Receiver<()>,
    tally: Arc<Tally>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let ticker = tick(every);
        let mut next = 0;
        loop {
            select! {
                recv(ticker) -> _ => {
                    let group = group_name(next % groups);
                    let evicted = heap.remove(&group).len() as u64;
                    tally.evicted.fetch_add(evicted, Ordering::SeqCst);
                    next += 1;
                }
                recv(done) -> _ => break,
            }
        }
    })
}
