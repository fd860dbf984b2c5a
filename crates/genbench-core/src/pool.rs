//! Fixed pool of long-lived workers pulling task ids from a shared queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use genbench_common::{BenchError, Result};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use crate::dispatch::Dispatcher;
use crate::report::{ResultReport, TaskId};
use crate::summary::Summary;

pub struct RunOutcome {
    /// In completion order.
    pub reports: Vec<ResultReport>,
    pub summary: Summary,
}

#[derive(Clone)]
pub struct Harness {
    dispatcher: Arc<Dispatcher>,
    workers: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new(dispatcher: Dispatcher, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(BenchError::Config("worker pool needs at least one worker".into()));
        }
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            workers,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Requests currently between send and report.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Dispatches tasks `0..n_tasks` and yields reports as they complete. The
    /// stream ends once every task has produced its report.
    pub fn stream(&self, n_tasks: usize) -> ReceiverStream<ResultReport> {
        let (task_tx, task_rx) = mpsc::channel::<TaskId>(self.workers);
        let (report_tx, report_rx) = mpsc::channel::<ResultReport>(self.workers);
        let task_rx = Arc::new(Mutex::new(task_rx));

        tokio::spawn(async move {
            for id in 0..n_tasks as u64 {
                if task_tx.send(TaskId(id)).await.is_err() {
                    break;
                }
            }
        });

        for worker in 0..self.workers {
            let tasks = task_rx.clone();
            let reports = report_tx.clone();
            let dispatcher = self.dispatcher.clone();
            let in_flight = self.in_flight.clone();
            tokio::spawn(async move {
                loop {
                    // lock only while waiting for the next id
                    let next = tasks.lock().await.recv().await;
                    let Some(id) = next else { break };
                    in_flight.fetch_add(1, Ordering::Relaxed);
                    let report = dispatcher.dispatch(id).await;
                    in_flight.fetch_sub(1, Ordering::Relaxed);
                    if reports.send(report).await.is_err() {
                        tracing::warn!(target: "harness", worker, "collector gone, stopping");
                        break;
                    }
                }
            });
        }
        drop(report_tx);
        ReceiverStream::new(report_rx)
    }

    /// Runs `n_tasks` requests, handing each report to `on_report` as soon as
    /// it arrives, then returns all reports plus the aggregate summary.
    pub async fn run<F>(&self, n_tasks: usize, mut on_report: F) -> RunOutcome
    where
        F: FnMut(&ResultReport),
    {
        tracing::info!(
            target: "harness",
            url = self.dispatcher.url(),
            workers = self.workers,
            tasks = n_tasks,
            "starting run"
        );
        let start = Instant::now();
        let mut summary = Summary::new(self.workers);
        let mut reports = Vec::with_capacity(n_tasks);
        let mut stream = self.stream(n_tasks);
        while let Some(report) = stream.next().await {
            summary.record(&report);
            on_report(&report);
            reports.push(report);
        }
        summary.elapsed_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            target: "harness",
            elapsed = summary.elapsed_secs,
            succeeded = summary.succeeded,
            failed = summary.failed(),
            "run finished"
        );
        RunOutcome { reports, summary }
    }
}
