use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::error::GeometryError;
use crate::processing::geometry::{build_vertex_buffer, GeometryInput, VertexBuffer};
use crate::state::entities::SegmentId;

pub type GeometryBuilder =
    dyn Fn(&GeometryInput) -> Result<VertexBuffer, GeometryError> + Send + Sync;

/// One segment to build, tagged with who asked for it.
#[derive(Debug, Clone)]
pub struct GeometryRequest {
    /// Key of the channel renderer that owns the segment.
    pub owner: String,
    /// Owner's cache generation when the request was made.
    pub generation: u64,
    pub input: GeometryInput,
}

impl GeometryRequest {
    pub fn segment_id(&self) -> SegmentId {
        self.input.segment.id()
    }
}

#[derive(Debug)]
pub struct GeometryResponse {
    pub owner: String,
    pub generation: u64,
    pub segment_id: SegmentId,
    pub result: Result<Arc<VertexBuffer>, GeometryError>,
}

/// Fixed set of background threads building vertex buffers.
///
/// Each worker has its own queue and requests are handed out round-robin.
/// Workers share nothing but the result channel; completion order is
/// arbitrary, so responses carry the segment id and owner they belong to.
pub struct GeometryPool {
    queues: Vec<Sender<GeometryRequest>>,
    results: Receiver<GeometryResponse>,
    workers: Vec<JoinHandle<()>>,
    next_worker: usize,
    in_flight: usize,
    repaint: Arc<Mutex<Option<egui::Context>>>,
}

impl GeometryPool {
    pub fn new(size: usize) -> Self {
        Self::with_builder(size, Arc::new(build_vertex_buffer))
    }

    pub fn with_builder(size: usize, builder: Arc<GeometryBuilder>) -> Self {
        let size = size.max(1);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<GeometryResponse>();
        let repaint: Arc<Mutex<Option<egui::Context>>> = Arc::new(Mutex::new(None));

        let mut queues = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<GeometryRequest>();
            let result_tx = result_tx.clone();
            let builder = Arc::clone(&builder);
            let repaint = Arc::clone(&repaint);

            let spawned = std::thread::Builder::new()
                .name(format!("geometry-worker-{index}"))
                .spawn(move || worker_loop(job_rx, result_tx, builder, repaint));

            match spawned {
                Ok(handle) => {
                    queues.push(job_tx);
                    workers.push(handle);
                }
                Err(e) => tracing::error!("Failed to spawn geometry worker {index}: {e}"),
            }
        }

        tracing::info!("Geometry pool started with {} workers", workers.len());

        Self {
            queues,
            results: result_rx,
            workers,
            next_worker: 0,
            in_flight: 0,
            repaint,
        }
    }

    pub fn size(&self) -> usize {
        self.queues.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Wakes the UI whenever a worker finishes a request.
    pub fn set_repaint_context(&self, ctx: egui::Context) {
        if let Ok(mut guard) = self.repaint.lock() {
            *guard = Some(ctx);
        }
    }

    /// Queues a request on the next worker. Never blocks.
    pub fn submit(&mut self, request: GeometryRequest) -> Result<(), GeometryError> {
        if self.queues.is_empty() {
            return Err(GeometryError::PoolClosed);
        }
        let index = self.next_worker % self.queues.len();
        self.next_worker = (index + 1) % self.queues.len();

        self.queues[index]
            .send(request)
            .map_err(|_| GeometryError::PoolClosed)?;
        self.in_flight += 1;
        Ok(())
    }

    /// Everything finished since the last call, without waiting.
    pub fn drain(&mut self) -> Vec<GeometryResponse> {
        let done: Vec<GeometryResponse> = self.results.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Blocks until `count` responses arrived or `timeout` passed. For
    /// headless callers and tests; the UI thread uses [`Self::drain`].
    pub fn wait_for(&mut self, count: usize, timeout: Duration) -> Vec<GeometryResponse> {
        let deadline = Instant::now() + timeout;
        let mut done = Vec::with_capacity(count);
        while done.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(response) => done.push(response),
                Err(_) => break,
            }
        }
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }
}

impl Drop for GeometryPool {
    fn drop(&mut self) {
        // Closing the queues ends each worker loop.
        self.queues.clear();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Geometry worker exited with a panic");
            }
        }
        tracing::debug!("Geometry pool shut down");
    }
}

fn worker_loop(
    jobs: Receiver<GeometryRequest>,
    results: Sender<GeometryResponse>,
    builder: Arc<GeometryBuilder>,
    repaint: Arc<Mutex<Option<egui::Context>>>,
) {
    for request in jobs.iter() {
        let segment_id = request.segment_id();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| builder(&request.input)));
        let result = match outcome {
            Ok(built) => built.map(Arc::new),
            Err(payload) => Err(GeometryError::WorkerPanicked(panic_message(payload.as_ref()))),
        };

        let response = GeometryResponse {
            owner: request.owner,
            generation: request.generation,
            segment_id,
            result,
        };
        if results.send(response).is_err() {
            // Pool dropped while this request was running.
            break;
        }

        if let Ok(guard) = repaint.lock() {
            if let Some(ctx) = guard.as_ref() {
                ctx.request_repaint();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
