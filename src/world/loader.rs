//! Async chunk generation over message passing
//!
//! The main thread talks to generation workers through a closed set of
//! request/response messages. Workers own their generator and placement
//! cache; nothing mutable is shared. Uses crossbeam channels so the main
//! thread only ever does non-blocking sends and polls.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{
    Receiver, Sender, TryRecvError, TrySendError, bounded, never, select, unbounded,
};
use thiserror::Error;

use crate::constants::{RESULT_QUEUE_CAPACITY, WORKER_QUEUE_CAPACITY};
use crate::core::coord::ChunkCoord;
use crate::core::pattern::PatternLibrary;
use crate::world::generator::{ChunkData, TerrainGenerator};
use crate::world::placement::{CellCache, GenerationParams};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("generation workers are disconnected")]
    Disconnected,
    #[error("generation channel was already initialised")]
    AlreadyInitialized,
    #[error("failed to spawn generation worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One chunk to generate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkRequest {
    pub coord: ChunkCoord,
    pub subdivision: u32,
    pub epoch: u32,
}

/// Main thread to worker
#[derive(Clone, Debug)]
pub enum WorkerRequest {
    /// Must precede any generation; sent once
    Init {
        seed: u32,
        patterns: PatternLibrary,
        params: GenerationParams,
    },
    /// Replaces the generation params on every worker
    Configure(GenerationParams),
    GenerateChunk(ChunkRequest),
    /// The chunk was unloaded; workers may drop per-chunk placement state
    UnregisterChunk(ChunkCoord),
    Shutdown,
}

/// Worker to main thread
#[derive(Debug)]
pub enum WorkerResponse {
    /// Sent once, after `Init` reached every worker
    Ready,
    /// Buffers move by ownership, never copied on the way back
    ChunkDataReady(ChunkData),
}

/// Transport between the lifecycle manager and generation workers.
///
/// Implementations buffer generation requests sent before `Ready` and never
/// block the caller.
pub trait GenerationChannel {
    fn send(&mut self, request: WorkerRequest) -> Result<(), ChannelError>;

    /// Next available response, if any
    fn try_recv(&mut self) -> Option<WorkerResponse>;

    fn is_ready(&self) -> bool;
}

/// Generation state owned by a single worker
pub struct GenerationWorker {
    generator: TerrainGenerator,
    cache: CellCache,
}

impl GenerationWorker {
    pub fn new(seed: u32, patterns: PatternLibrary, params: GenerationParams) -> Self {
        Self {
            generator: TerrainGenerator::new(seed, patterns, params),
            cache: CellCache::new(),
        }
    }

    pub fn configure(&mut self, params: GenerationParams) {
        self.generator.set_params(params);
        self.cache.clear();
    }

    pub fn generate(&mut self, request: ChunkRequest) -> ChunkData {
        let mut data = self
            .generator
            .generate_cached(request.coord, request.subdivision, &mut self.cache);
        data.epoch = request.epoch;
        data
    }

    pub fn unregister(&mut self, coord: ChunkCoord) {
        let cell_size = self.generator.params().pattern_cell_size;
        self.cache
            .release_chunk(coord, cell_size, self.generator.cell_rings());
    }

    pub fn cached_cells(&self) -> usize {
        self.cache.len()
    }
}

// ---- Threaded worker pool ----

#[derive(Clone)]
enum WorkerControl {
    Init {
        seed: u32,
        patterns: PatternLibrary,
        params: GenerationParams,
    },
    Configure(GenerationParams),
    Unregister(ChunkCoord),
    Shutdown,
}

enum WorkerEvent {
    Ready(usize),
    Chunk(ChunkData),
}

/// Background generation workers sharing one job queue.
///
/// Control messages (init, configure, unregister) are broadcast to every
/// worker over its own channel; generation jobs go through a shared bounded
/// queue and overflow into a local backlog.
pub struct WorkerPool {
    controls: Vec<Sender<WorkerControl>>,
    job_tx: Sender<ChunkRequest>,
    result_rx: Receiver<WorkerEvent>,
    handles: Vec<JoinHandle<()>>,
    backlog: VecDeque<ChunkRequest>,
    initialized: bool,
    ready_workers: usize,
    ready: bool,
    closed: bool,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Result<Self, ChannelError> {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = bounded::<ChunkRequest>(WORKER_QUEUE_CAPACITY);
        let (result_tx, result_rx) = bounded::<WorkerEvent>(RESULT_QUEUE_CAPACITY);

        let mut controls = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let (control_tx, control_rx) = unbounded::<WorkerControl>();
            let jobs = job_rx.clone();
            let results = result_tx.clone();

            let handle = thread::Builder::new()
                .name(format!("chunk-gen-{}", worker_id))
                .spawn(move || worker_loop(worker_id, control_rx, jobs, results))?;
            controls.push(control_tx);
            handles.push(handle);
        }

        tracing::info!("Spawned {} chunk generation workers", worker_count);

        Ok(WorkerPool {
            controls,
            job_tx,
            result_rx,
            handles,
            backlog: VecDeque::new(),
            initialized: false,
            ready_workers: 0,
            ready: false,
            closed: false,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.controls.len()
    }

    /// Requests held back until the workers are ready or the queue drains
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn broadcast(&mut self, control: WorkerControl) -> Result<(), ChannelError> {
        for tx in &self.controls {
            if tx.send(control.clone()).is_err() {
                self.closed = true;
                return Err(ChannelError::Disconnected);
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, request: ChunkRequest) -> Result<(), ChannelError> {
        if !self.ready || !self.backlog.is_empty() {
            self.backlog.push_back(request);
            return Ok(());
        }
        match self.job_tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                self.backlog.push_back(request);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.closed = true;
                Err(ChannelError::Disconnected)
            }
        }
    }

    /// Moves backlogged requests into the job queue while it has room
    fn flush_backlog(&mut self) {
        if !self.ready {
            return;
        }
        while let Some(request) = self.backlog.pop_front() {
            match self.job_tx.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => {
                    self.backlog.push_front(request);
                    break;
                }
                Err(TrySendError::Disconnected(request)) => {
                    self.backlog.push_front(request);
                    self.closed = true;
                    break;
                }
            }
        }
    }

    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for tx in &self.controls {
            let _ = tx.send(WorkerControl::Shutdown);
        }
        // Dropping the receiver unblocks workers stuck on a full result queue
        self.result_rx = never();
        self.closed = true;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Chunk generation worker panicked");
            }
        }
        tracing::info!("Chunk generation workers stopped");
    }
}

impl GenerationChannel for WorkerPool {
    fn send(&mut self, request: WorkerRequest) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Disconnected);
        }
        match request {
            WorkerRequest::Init {
                seed,
                patterns,
                params,
            } => {
                if self.initialized {
                    return Err(ChannelError::AlreadyInitialized);
                }
                self.initialized = true;
                self.broadcast(WorkerControl::Init {
                    seed,
                    patterns,
                    params,
                })
            }
            WorkerRequest::Configure(params) => self.broadcast(WorkerControl::Configure(params)),
            WorkerRequest::GenerateChunk(request) => self.enqueue(request),
            WorkerRequest::UnregisterChunk(coord) => self.broadcast(WorkerControl::Unregister(coord)),
            WorkerRequest::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    fn try_recv(&mut self) -> Option<WorkerResponse> {
        loop {
            match self.result_rx.try_recv() {
                Ok(WorkerEvent::Ready(worker_id)) => {
                    tracing::debug!("Chunk generation worker {} ready", worker_id);
                    self.ready_workers += 1;
                    if self.ready_workers == self.controls.len() {
                        self.ready = true;
                        self.flush_backlog();
                        return Some(WorkerResponse::Ready);
                    }
                }
                Ok(WorkerEvent::Chunk(data)) => {
                    self.flush_backlog();
                    return Some(WorkerResponse::ChunkDataReady(data));
                }
                Err(TryRecvError::Empty) => {
                    self.flush_backlog();
                    return None;
                }
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        tracing::error!("All chunk generation workers have exited");
                    }
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready && !self.closed
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Applies one control message. Returns false when the worker should exit.
fn apply_control(
    worker_id: usize,
    worker: &mut Option<GenerationWorker>,
    control: WorkerControl,
    results: &Sender<WorkerEvent>,
) -> bool {
    match control {
        WorkerControl::Init {
            seed,
            patterns,
            params,
        } => {
            *worker = Some(GenerationWorker::new(seed, patterns, params));
            results.send(WorkerEvent::Ready(worker_id)).is_ok()
        }
        WorkerControl::Configure(params) => {
            if let Some(worker) = worker.as_mut() {
                worker.configure(params);
            }
            true
        }
        WorkerControl::Unregister(coord) => {
            if let Some(worker) = worker.as_mut() {
                worker.unregister(coord);
            }
            true
        }
        WorkerControl::Shutdown => false,
    }
}

fn worker_loop(
    worker_id: usize,
    control_rx: Receiver<WorkerControl>,
    job_rx: Receiver<ChunkRequest>,
    results: Sender<WorkerEvent>,
) {
    let mut worker: Option<GenerationWorker> = None;
    loop {
        select! {
            recv(control_rx) -> msg => match msg {
                Ok(control) => {
                    if !apply_control(worker_id, &mut worker, control, &results) {
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(job_rx) -> job => {
                let Ok(request) = job else {
                    break;
                };
                // Controls sent before this job must be applied first
                let mut alive = true;
                while let Ok(control) = control_rx.try_recv() {
                    if !apply_control(worker_id, &mut worker, control, &results) {
                        alive = false;
                        break;
                    }
                }
                if !alive {
                    break;
                }
                let Some(generator) = worker.as_mut() else {
                    tracing::warn!("Worker {} got chunk {} before init, dropping", worker_id, request.coord);
                    continue;
                };
                let data = generator.generate(request);
                if results.send(WorkerEvent::Chunk(data)).is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Chunk generation worker {} exiting", worker_id);
}

// ---- Synchronous channel ----

/// Single-threaded channel that generates on the caller's thread.
///
/// In automatic mode every queued job is generated on the next `try_recv`.
/// In manual mode jobs wait until [`process_matching`](Self::process_matching)
/// runs them, so callers can reorder or drop responses.
pub struct InlineChannel {
    worker: Option<GenerationWorker>,
    jobs: VecDeque<ChunkRequest>,
    outbox: VecDeque<WorkerResponse>,
    manual: bool,
    closed: bool,
    sent: Vec<WorkerRequest>,
}

impl InlineChannel {
    pub fn new() -> Self {
        Self {
            worker: None,
            jobs: VecDeque::new(),
            outbox: VecDeque::new(),
            manual: false,
            closed: false,
            sent: Vec::new(),
        }
    }

    pub fn manual() -> Self {
        Self {
            manual: true,
            ..Self::new()
        }
    }

    /// Jobs not yet generated
    pub fn queued(&self) -> impl Iterator<Item = &ChunkRequest> {
        self.jobs.iter()
    }

    /// Every request accepted so far, in order
    pub fn sent(&self) -> &[WorkerRequest] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Generates queued jobs that satisfy `filter`, leaving the rest queued.
    /// Returns how many were generated.
    pub fn process_matching<F>(&mut self, mut filter: F) -> usize
    where
        F: FnMut(&ChunkRequest) -> bool,
    {
        let Some(worker) = self.worker.as_mut() else {
            return 0;
        };
        let mut kept = VecDeque::with_capacity(self.jobs.len());
        let mut processed = 0;
        while let Some(request) = self.jobs.pop_front() {
            if filter(&request) {
                self.outbox
                    .push_back(WorkerResponse::ChunkDataReady(worker.generate(request)));
                processed += 1;
            } else {
                kept.push_back(request);
            }
        }
        self.jobs = kept;
        processed
    }

    pub fn process_all(&mut self) -> usize {
        self.process_matching(|_| true)
    }

    /// Loses every queued job, as a crashed worker would
    pub fn drop_queued(&mut self) -> usize {
        let lost = self.jobs.len();
        self.jobs.clear();
        lost
    }

    pub fn worker(&self) -> Option<&GenerationWorker> {
        self.worker.as_ref()
    }
}

impl Default for InlineChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationChannel for InlineChannel {
    fn send(&mut self, request: WorkerRequest) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Disconnected);
        }
        self.sent.push(request.clone());
        match request {
            WorkerRequest::Init {
                seed,
                patterns,
                params,
            } => {
                if self.worker.is_some() {
                    return Err(ChannelError::AlreadyInitialized);
                }
                self.worker = Some(GenerationWorker::new(seed, patterns, params));
                self.outbox.push_back(WorkerResponse::Ready);
            }
            WorkerRequest::Configure(params) => {
                if let Some(worker) = self.worker.as_mut() {
                    worker.configure(params);
                }
            }
            WorkerRequest::GenerateChunk(request) => self.jobs.push_back(request),
            WorkerRequest::UnregisterChunk(coord) => {
                if let Some(worker) = self.worker.as_mut() {
                    worker.unregister(coord);
                }
            }
            WorkerRequest::Shutdown => {
                self.closed = true;
                self.jobs.clear();
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<WorkerResponse> {
        if !self.manual {
            self.process_all();
        }
        self.outbox.pop_front()
    }

    fn is_ready(&self) -> bool {
        self.worker.is_some() && !self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() -> WorkerRequest {
        WorkerRequest::Init {
            seed: 42,
            patterns: PatternLibrary::builtin(),
            params: GenerationParams::default(),
        }
    }

    fn job(x: i32, z: i32, subdivision: u32) -> WorkerRequest {
        WorkerRequest::GenerateChunk(ChunkRequest {
            coord: ChunkCoord::new(x, z),
            subdivision,
            epoch: 0,
        })
    }

    #[test]
    fn test_requests_before_init_are_buffered() {
        let mut channel = InlineChannel::new();
        channel.send(job(1, 2, 4)).unwrap();
        assert!(channel.try_recv().is_none());
        assert_eq!(channel.queued().count(), 1);

        channel.send(init()).unwrap();
        assert!(matches!(channel.try_recv(), Some(WorkerResponse::Ready)));
        match channel.try_recv() {
            Some(WorkerResponse::ChunkDataReady(data)) => {
                assert_eq!(data.coord, ChunkCoord::new(1, 2));
                assert_eq!(data.subdivision, 4);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_second_init_is_rejected() {
        let mut channel = InlineChannel::new();
        channel.send(init()).unwrap();
        assert!(matches!(channel.send(init()), Err(ChannelError::AlreadyInitialized)));
    }

    #[test]
    fn test_manual_processing_can_reorder() {
        let mut channel = InlineChannel::manual();
        channel.send(init()).unwrap();
        channel.send(job(2, 5, 8)).unwrap();
        channel.send(job(2, 5, 4)).unwrap();
        assert!(matches!(channel.try_recv(), Some(WorkerResponse::Ready)));
        assert!(channel.try_recv().is_none());

        assert_eq!(channel.process_matching(|r| r.subdivision == 4), 1);
        assert_eq!(channel.process_all(), 1);
        let order: Vec<u32> = std::iter::from_fn(|| channel.try_recv())
            .filter_map(|r| match r {
                WorkerResponse::ChunkDataReady(data) => Some(data.subdivision),
                WorkerResponse::Ready => None,
            })
            .collect();
        assert_eq!(order, vec![4, 8]);
    }

    #[test]
    fn test_shutdown_disconnects() {
        let mut channel = InlineChannel::new();
        channel.send(init()).unwrap();
        channel.send(WorkerRequest::Shutdown).unwrap();
        assert!(!channel.is_ready());
        assert!(matches!(channel.send(job(0, 0, 1)), Err(ChannelError::Disconnected)));
    }

    #[test]
    fn test_worker_echoes_epoch_and_releases_cells() {
        let mut worker = GenerationWorker::new(42, PatternLibrary::builtin(), GenerationParams::default());
        let data = worker.generate(ChunkRequest {
            coord: ChunkCoord::new(0, 0),
            subdivision: 2,
            epoch: 7,
        });
        assert_eq!(data.epoch, 7);
        assert_eq!(worker.cached_cells(), 9);
        worker.unregister(ChunkCoord::new(0, 0));
        assert_eq!(worker.cached_cells(), 0);
    }
}
