//! Async handler execution.
//!
//! ```text
//! emit ──► [intake queue] ──► intake loop ──► [pool queue] ──► worker 1..N ──► handler
//!          (bounded)          (timed poll)     (bounded)        (timed poll)
//! ```
//!
//! The intake queue exists for the whole life of the bus, so async jobs can be
//! enqueued while the worker is stopped; they are simply not drained until
//! `start`. Each `start` begins a new run with its own stop flag, which keeps a
//! thread that outlived a previous `stop` from picking up new work.
//!
//! Delivery is at-most-once: `stop` discards anything still queued.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::config::EventBusConfig;
use super::payload::EventPayload;
use super::stats::StatsCounters;
use super::subscription::Subscription;
use crate::error::EventBusError;

/// Body of a worker or intake thread
type ThreadBody = Box<dyn FnOnce() + Send + 'static>;

/// One deferred handler invocation
pub(crate) struct AsyncJob {
    pub(crate) subscription: Arc<Subscription>,
    pub(crate) event_type: String,
    pub(crate) payload: EventPayload,
}

impl AsyncJob {
    fn run(self, stats: &StatsCounters) {
        tracing::trace!(
            event_type = %self.event_type,
            subscription = %self.subscription.id(),
            "Running async handler"
        );
        let succeeded = self.subscription.invoke(&self.event_type, &self.payload);
        stats.record_invocation(succeeded);
    }
}

/// Threads and stop flag of one `start`..`stop` cycle
struct WorkerRun {
    active: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

/// Bounded intake queue drained by a fixed-size thread pool
pub(crate) struct AsyncWorker {
    capacity: usize,
    worker_threads: usize,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    enqueue_timeout: Duration,
    intake_tx: Sender<AsyncJob>,
    intake_rx: Receiver<AsyncJob>,
    run: Mutex<Option<WorkerRun>>,
    stats: Arc<StatsCounters>,
}

impl AsyncWorker {
    pub(crate) fn new(config: &EventBusConfig, stats: Arc<StatsCounters>) -> Self {
        let (intake_tx, intake_rx) = bounded(config.queue_capacity);
        Self {
            capacity: config.queue_capacity,
            worker_threads: config.worker_threads,
            poll_interval: config.poll_interval(),
            shutdown_timeout: config.shutdown_timeout(),
            enqueue_timeout: config.enqueue_timeout(),
            intake_tx,
            intake_rx,
            run: Mutex::new(None),
            stats,
        }
    }

    /// Queue a job, waiting up to the enqueue timeout while the queue is full
    pub(crate) fn enqueue(&self, job: AsyncJob) -> Result<(), EventBusError> {
        // The worker holds `intake_rx` for its whole life, so a send can only
        // fail by timing out.
        match self.intake_tx.send_timeout(job, self.enqueue_timeout) {
            Ok(()) => {
                self.stats.record_enqueued();
                Ok(())
            }
            Err(_) => Err(EventBusError::QueueFull {
                capacity: self.capacity,
            }),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Jobs waiting in the intake queue
    pub(crate) fn queued(&self) -> usize {
        self.intake_rx.len()
    }

    /// Spawn the intake loop and the pool. No-op when already running.
    pub(crate) fn start(&self) -> Result<(), EventBusError> {
        self.start_with(|name, body| thread::Builder::new().name(name).spawn(body))
    }

    /// Start using `spawn` to create each thread.
    ///
    /// If any spawn fails, the threads already spawned are stopped and joined
    /// and the worker stays stopped.
    fn start_with<S>(&self, mut spawn: S) -> Result<(), EventBusError>
    where
        S: FnMut(String, ThreadBody) -> io::Result<JoinHandle<()>>,
    {
        let mut run = self.run.lock();
        if run.is_some() {
            return Ok(());
        }

        let active = Arc::new(AtomicBool::new(true));
        let (pool_tx, pool_rx) = bounded::<AsyncJob>(self.worker_threads);
        let mut threads = Vec::with_capacity(self.worker_threads + 1);

        for index in 0..self.worker_threads {
            let rx = pool_rx.clone();
            let worker_active = Arc::clone(&active);
            let stats = Arc::clone(&self.stats);
            let poll = self.poll_interval;
            let body: ThreadBody = Box::new(move || worker_loop(rx, worker_active, stats, poll));
            match spawn(format!("deskpet-worker-{}", index), body) {
                Ok(handle) => threads.push(handle),
                Err(err) => return Err(self.abort_start(&active, threads, err)),
            }
        }

        let rx = self.intake_rx.clone();
        let intake_active = Arc::clone(&active);
        let stats = Arc::clone(&self.stats);
        let poll = self.poll_interval;
        let body: ThreadBody =
            Box::new(move || intake_loop(rx, pool_tx, intake_active, stats, poll));
        match spawn("deskpet-intake".to_string(), body) {
            Ok(handle) => threads.push(handle),
            Err(err) => return Err(self.abort_start(&active, threads, err)),
        }

        tracing::debug!("Async worker started with {} threads", self.worker_threads);
        *run = Some(WorkerRun { active, threads });
        Ok(())
    }

    fn abort_start(
        &self,
        active: &AtomicBool,
        threads: Vec<JoinHandle<()>>,
        err: io::Error,
    ) -> EventBusError {
        active.store(false, Ordering::Release);
        self.join_bounded(threads);
        tracing::error!("Async worker failed to start: {}", err);
        EventBusError::WorkerSpawn(err)
    }

    /// Signal the run to stop, join with a bounded wait, discard queued jobs.
    ///
    /// No-op when not running. Returns the number of discarded jobs.
    pub(crate) fn stop(&self) -> usize {
        let Some(run) = self.run.lock().take() else {
            return 0;
        };
        run.active.store(false, Ordering::Release);
        self.join_bounded(run.threads);

        let discarded = self.intake_rx.try_iter().count();
        if discarded > 0 {
            self.stats.record_dropped(discarded as u64);
            tracing::warn!("Discarded {} queued async jobs on shutdown", discarded);
        }
        tracing::debug!("Async worker stopped");
        discarded
    }

    /// Join threads, detaching any still running after the shutdown timeout
    fn join_bounded(&self, threads: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.shutdown_timeout;
        for handle in threads {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("Async worker thread terminated by panic");
                }
            } else {
                let name = handle.thread().name().unwrap_or("unnamed").to_string();
                tracing::error!("Async worker thread '{}' did not stop in time, detaching", name);
            }
        }
    }
}

impl Drop for AsyncWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn intake_loop(
    intake: Receiver<AsyncJob>,
    pool: Sender<AsyncJob>,
    active: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    poll: Duration,
) {
    while active.load(Ordering::Acquire) {
        let mut job = match intake.recv_timeout(poll) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        loop {
            match pool.send_timeout(job, poll) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if !active.load(Ordering::Acquire) {
                        stats.record_dropped(1);
                        break;
                    }
                    job = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    stats.record_dropped(1);
                    return;
                }
            }
        }
    }
}

fn worker_loop(
    jobs: Receiver<AsyncJob>,
    active: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    poll: Duration,
) {
    loop {
        match jobs.recv_timeout(poll) {
            Ok(job) if active.load(Ordering::Acquire) => job.run(&stats),
            Ok(_) => stats.record_dropped(1),
            Err(RecvTimeoutError::Timeout) => {
                if !active.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let leftover = jobs.try_iter().count();
    if leftover > 0 {
        stats.record_dropped(leftover as u64);
    }
}
