use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use voxelfront_common::GridPos;
use voxelfront_mesh::{extract_chunk, ChunkGeometry};
use voxelfront_volume::VoxelVolume;

struct ExtractionJob {
    tag: u64,
    grid: GridPos,
}

/// Result of one background extraction.
///
/// `geometry` is `None` when the cell had no voxel data and no generator
/// could produce any; the scheduler still clears the cell's pending mark so
/// a later pass may retry.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub grid: GridPos,
    pub geometry: Option<ChunkGeometry>,
}

/// Worker pool that runs chunk extraction off the owning thread.
///
/// Jobs go out over an unbounded channel, finished geometry comes back over
/// another; workers touch only the shared [`VoxelVolume`] and never any GPU
/// state. Every job carries a tag from a monotonic counter, and each pending
/// cell remembers the tag of its newest job: a result is accepted only when
/// the tags match. That keeps at most one live extraction per cell, lets
/// [`refresh`](Self::refresh) supersede an in-flight job after a voxel edit,
/// and makes [`reset`](Self::reset) a matter of clearing the pending map.
pub struct ExtractionScheduler {
    jobs: Option<Sender<ExtractionJob>>,
    results: Receiver<(u64, ExtractionOutcome)>,
    pending: HashMap<GridPos, u64>,
    next_tag: u64,
    workers: Vec<JoinHandle<()>>,
}

impl ExtractionScheduler {
    pub fn new(volume: Arc<VoxelVolume>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ExtractionJob>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let workers = (0..worker_count)
            .map(|index| {
                let volume = Arc::clone(&volume);
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                std::thread::Builder::new()
                    .name(format!("extract-{index}"))
                    .spawn(move || worker_loop(volume, job_rx, result_tx))
                    .expect("spawn extraction worker")
            })
            .collect();

        tracing::debug!(worker_count, "extraction scheduler started");
        Self {
            jobs: Some(job_tx),
            results: result_rx,
            pending: HashMap::new(),
            next_tag: 0,
            workers,
        }
    }

    fn issue(&mut self, grid: GridPos) {
        self.next_tag += 1;
        self.pending.insert(grid, self.next_tag);
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(ExtractionJob {
                tag: self.next_tag,
                grid,
            });
        }
    }

    /// Queue a cell for extraction. Returns false if it is already pending.
    pub fn request(&mut self, grid: GridPos) -> bool {
        if self.pending.contains_key(&grid) {
            return false;
        }
        self.issue(grid);
        tracing::trace!(?grid, "extraction requested");
        true
    }

    /// Queue a fresh extraction even if one is already in flight. The cell's
    /// pending tag moves to the new job, so a superseded result arrives with
    /// a stale tag and is dropped. Used after voxel edits, where geometry
    /// extracted from the pre-edit volume must never reach the cache.
    pub fn refresh(&mut self, grid: GridPos) {
        self.issue(grid);
        tracing::trace!(?grid, "extraction refreshed");
    }

    pub fn is_pending(&self, grid: GridPos) -> bool {
        self.pending.contains_key(&grid)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drain completed extractions without blocking.
    ///
    /// A result whose tag no longer matches its cell's pending entry was
    /// superseded by a refresh or a reset and is dropped. Everything else
    /// clears its cell's pending mark, including no-data outcomes.
    pub fn poll_completed(&mut self) -> Vec<ExtractionOutcome> {
        let mut out = Vec::new();
        while let Ok((tag, outcome)) = self.results.try_recv() {
            if self.pending.get(&outcome.grid) != Some(&tag) {
                continue;
            }
            self.pending.remove(&outcome.grid);
            out.push(outcome);
        }
        out
    }

    /// Forget all queued and in-flight work. Results already computed will
    /// arrive with tags that match no pending cell and be ignored.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Drop for ExtractionScheduler {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop.
        self.jobs = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    volume: Arc<VoxelVolume>,
    jobs: Receiver<ExtractionJob>,
    results: Sender<(u64, ExtractionOutcome)>,
) {
    while let Ok(job) = jobs.recv() {
        let geometry = volume
            .ensure_page(job.grid)
            .map(|page| extract_chunk(&page, job.grid));
        let outcome = ExtractionOutcome {
            grid: job.grid,
            geometry,
        };
        if results.send((job.tag, outcome)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain(scheduler: &mut ExtractionScheduler) -> Vec<ExtractionOutcome> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while scheduler.pending_count() > 0 {
            out.extend(scheduler.poll_completed());
            if Instant::now() > deadline {
                panic!("extraction did not finish in time");
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        out.extend(scheduler.poll_completed());
        out
    }

    #[test]
    fn duplicate_requests_are_coalesced() {
        let volume = Arc::new(VoxelVolume::with_seed(7));
        let mut scheduler = ExtractionScheduler::new(volume, 2);
        assert!(scheduler.request(GridPos::new(0, 0)));
        assert!(!scheduler.request(GridPos::new(0, 0)));
        assert_eq!(scheduler.pending_count(), 1);
        let outcomes = drain(&mut scheduler);
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn generated_terrain_yields_geometry() {
        let volume = Arc::new(VoxelVolume::with_seed(7));
        let mut scheduler = ExtractionScheduler::new(volume, 1);
        scheduler.request(GridPos::new(2, -1));
        let outcomes = drain(&mut scheduler);
        let geometry = outcomes[0].geometry.as_ref().expect("terrain generates data");
        assert_eq!(geometry.grid, GridPos::new(2, -1));
        assert!(!geometry.is_empty());
    }

    #[test]
    fn missing_data_completes_without_geometry() {
        let volume = Arc::new(VoxelVolume::empty());
        let mut scheduler = ExtractionScheduler::new(volume, 1);
        scheduler.request(GridPos::new(0, 0));
        let outcomes = drain(&mut scheduler);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].geometry.is_none());
        // The cell may be requested again later.
        assert!(scheduler.request(GridPos::new(0, 0)));
        drain(&mut scheduler);
    }

    #[test]
    fn refresh_supersedes_an_in_flight_job() {
        let volume = Arc::new(VoxelVolume::with_seed(7));
        let mut scheduler = ExtractionScheduler::new(volume, 2);
        assert!(scheduler.request(GridPos::new(0, 0)));
        scheduler.refresh(GridPos::new(0, 0));
        assert_eq!(scheduler.pending_count(), 1);
        // Two jobs ran, but only the newer one's result may surface.
        let outcomes = drain(&mut scheduler);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn reset_discards_in_flight_results() {
        let volume = Arc::new(VoxelVolume::with_seed(7));
        let mut scheduler = ExtractionScheduler::new(volume, 2);
        for x in 0..4 {
            scheduler.request(GridPos::new(x, 0));
        }
        scheduler.reset();
        assert_eq!(scheduler.pending_count(), 0);
        // Give superseded results time to land; none may surface.
        std::thread::sleep(Duration::from_millis(100));
        assert!(scheduler.poll_completed().is_empty());
    }

    #[test]
    fn shutdown_joins_workers() {
        let volume = Arc::new(VoxelVolume::with_seed(7));
        let mut scheduler = ExtractionScheduler::new(volume, 4);
        scheduler.request(GridPos::new(0, 0));
        drop(scheduler);
    }
}
