/// Tile-draining thread pool for parallel rasterization.
///
/// Workers and the dispatching thread pull tile indices from a shared atomic
/// counter until the grid is exhausted. The one-owner-tile binning invariant
/// (see [`crate::tiles`]) is what makes the concurrent framebuffer writes
/// sound; see the [`FrameView`] safety notes for the accepted exception.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::framebuffer::{FrameView, Framebuffer};
use crate::prepared::PreparedTriangle;
use crate::rasterizer::Rasterizer;
use crate::texture::TextureSet;
use crate::tiles::TileGrid;

/// Everything a worker needs to rasterize one frame. Published under the
/// pool mutex, then read concurrently while the epoch is live.
#[derive(Clone)]
struct FrameJob {
    /// Raw view of the triangle slice; valid for the duration of dispatch,
    /// which blocks until every worker has finished the frame.
    triangles: *const PreparedTriangle,
    triangle_count: usize,
    grid: *const TileGrid,
    total_tiles: usize,
    view: FrameView,
    textures: Arc<TextureSet>,
}

// Safety: dispatch() keeps the triangle slice, the grid and the framebuffer
// borrowed (and therefore alive and unmodified) until work_done signals that
// no worker holds the job anymore.
unsafe impl Send for FrameJob {}

struct PoolState {
    job: Option<FrameJob>,
    /// Bumped once per dispatch so sleeping workers can tell a fresh job
    /// from the one they just finished.
    epoch: u64,
    active_workers: usize,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    work_done: Condvar,
    next_tile: AtomicUsize,
}

/// Fixed-size rasterization pool. Holds N sleeping workers between frames;
/// the thread calling [`ThreadPool::dispatch`] participates in draining, so
/// effective parallelism is N + 1.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    /// Texture table handed to every per-frame rasterizer.
    pub textures: Arc<TextureSet>,
}

impl ThreadPool {
    /// Spawn a pool with `workers` worker threads; the dispatching thread
    /// renders alongside them, so effective parallelism is `workers + 1`.
    /// Zero is clamped to one worker. Returns None if a worker thread cannot
    /// be spawned; the partial pool is torn down before returning.
    pub fn create(workers: usize) -> Option<ThreadPool> {
        let worker_count = workers.max(1);

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                job: None,
                epoch: 0,
                active_workers: 0,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            work_done: Condvar::new(),
            next_tile: AtomicUsize::new(0),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let worker_shared = Arc::clone(&shared);
            let builder = thread::Builder::new().name(format!("raster-{i}"));
            match builder.spawn(move || worker_loop(&worker_shared)) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    log::warn!("failed to spawn rasterizer worker {i}: {err}");
                    shutdown_workers(&shared, workers);
                    return None;
                }
            }
        }

        Some(ThreadPool {
            shared,
            workers,
            textures: Arc::new(TextureSet::default()),
        })
    }

    /// Pool sized to the machine: one worker per core minus one, so workers
    /// plus the dispatching thread together match the core count.
    pub fn with_default_threads() -> Option<ThreadPool> {
        let workers = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1);
        Self::create(workers)
    }

    /// Total rendering threads, counting the caller.
    pub fn thread_count(&self) -> usize {
        self.workers.len() + 1
    }

    /// Bin, render and synchronize one frame. Blocks until every tile has
    /// been drained; on return the framebuffer holds the finished frame.
    ///
    /// `&mut self` makes overlapping dispatches unrepresentable, so the
    /// single job slot is never contended between frames.
    pub fn dispatch(&mut self, triangles: &[PreparedTriangle], framebuffer: &mut Framebuffer) {
        let grid = TileGrid::bin(triangles, framebuffer.width, framebuffer.height);
        let total_tiles = grid.tile_count();
        if total_tiles == 0 || triangles.is_empty() {
            return;
        }

        let job = FrameJob {
            triangles: triangles.as_ptr(),
            triangle_count: triangles.len(),
            grid: &grid,
            total_tiles,
            view: framebuffer.view(),
            textures: Arc::clone(&self.textures),
        };

        self.shared.next_tile.store(0, Ordering::Relaxed);
        {
            let mut state = lock_state(&self.shared);
            state.job = Some(job.clone());
            state.epoch = state.epoch.wrapping_add(1);
        }
        self.shared.work_ready.notify_all();

        // The dispatching thread drains tiles alongside the workers.
        run_tiles(&self.shared, &job);

        // Wait for stragglers, then retire the job so late-waking workers
        // see an empty slot instead of a stale frame.
        let mut state = lock_state(&self.shared);
        while state.active_workers > 0 {
            state = self
                .shared
                .work_done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        state.job = None;
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        shutdown_workers(&self.shared, std::mem::take(&mut self.workers));
    }
}

fn lock_state(shared: &PoolShared) -> std::sync::MutexGuard<'_, PoolState> {
    shared
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn shutdown_workers(shared: &PoolShared, workers: Vec<JoinHandle<()>>) {
    {
        let mut state = lock_state(shared);
        state.shutdown = true;
    }
    shared.work_ready.notify_all();
    for worker in workers {
        if worker.join().is_err() {
            log::warn!("rasterizer worker panicked during shutdown");
        }
    }
}

fn worker_loop(shared: &PoolShared) {
    let mut last_epoch = 0u64;
    loop {
        let job = {
            let mut state = lock_state(shared);
            loop {
                if state.shutdown {
                    return;
                }
                if state.epoch != last_epoch {
                    if let Some(job) = state.job.clone() {
                        last_epoch = state.epoch;
                        state.active_workers += 1;
                        break job;
                    }
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        run_tiles(shared, &job);

        let mut state = lock_state(shared);
        state.active_workers -= 1;
        if state.active_workers == 0 {
            shared.work_done.notify_all();
        }
    }
}

/// Drain tiles from the shared counter until the grid is exhausted. Each
/// thread builds its own rasterizer so stats and texture lookups stay
/// unsynchronized.
fn run_tiles(shared: &PoolShared, job: &FrameJob) {
    let mut rasterizer = Rasterizer::with_textures(Arc::clone(&job.textures));
    // Safety: dispatch() keeps both borrows alive until the frame completes.
    let triangles =
        unsafe { std::slice::from_raw_parts(job.triangles, job.triangle_count) };
    let grid = unsafe { &*job.grid };
    let mut view = job.view;

    loop {
        let tile = shared.next_tile.fetch_add(1, Ordering::Relaxed);
        if tile >= job.total_tiles {
            break;
        }
        let bin = grid.bin_at(tile);
        if bin.is_empty() {
            continue;
        }
        for &index in bin.indices() {
            rasterizer.rasterize_triangle(&triangles[index as usize], &mut view);
        }
    }
}
