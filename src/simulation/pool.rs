//! Scoped worker pool that splits a fixed number of trials across threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::bounded;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{dispatcher, info_span, Dispatch, Span};

use crate::entity::RecordId;
use crate::error::{ExecutionError, MoocletError, MoocletResult};

/// Occurrence count per chosen id.
pub(crate) type Tally = HashMap<RecordId, usize>;

fn worker_err(message: String) -> MoocletError {
    MoocletError::Execution(ExecutionError::Worker { message })
}

/// Number of trials worker `idx` of `workers` runs.
const fn share(iterations: usize, workers: usize, idx: usize) -> usize {
    iterations / workers + (idx < iterations % workers) as usize
}

/// Runs `trial` exactly `iterations` times over up to `workers` named
/// threads and merges the per-thread tallies.
///
/// Each worker owns its RNG, seeded `seed + idx` when a seed is given. The
/// first failing trial stops every worker and its error is returned.
/// Workers run under the caller's subscriber, in a `simulation_worker` span
/// parented to the caller's current span.
pub(crate) fn run_trials<F>(
    iterations: usize,
    workers: usize,
    seed: Option<u64>,
    trial: F,
) -> MoocletResult<Tally>
where
    F: Fn(&mut dyn RngCore) -> MoocletResult<RecordId> + Sync,
{
    let workers = workers.clamp(1, iterations.max(1));
    let (tx, rx) = bounded::<MoocletResult<Tally>>(workers);
    let abort = AtomicBool::new(false);
    let dispatch = dispatcher::get_default(Dispatch::clone);
    let parent = Span::current();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let tx = tx.clone();
            let trial = &trial;
            let abort = &abort;
            let dispatch = &dispatch;
            let parent = &parent;
            let trials = share(iterations, workers, idx);
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(idx as u64)),
                None => ChaCha8Rng::from_entropy(),
            };
            let handle = thread::Builder::new()
                .name(format!("mooclet-sim-{idx}"))
                .spawn_scoped(scope, move || {
                    dispatcher::with_default(dispatch, || {
                        let span =
                            info_span!(parent: parent, "simulation_worker", worker = idx, trials);
                        let _guard = span.enter();
                        let rng: &mut dyn RngCore = &mut rng;
                        let mut tally = Tally::new();
                        for _ in 0..trials {
                            if abort.load(Ordering::Relaxed) {
                                break;
                            }
                            match trial(&mut *rng) {
                                Ok(id) => *tally.entry(id).or_insert(0) += 1,
                                Err(e) => {
                                    abort.store(true, Ordering::Relaxed);
                                    let _ = tx.send(Err(e));
                                    return;
                                }
                            }
                        }
                        let _ = tx.send(Ok(tally));
                    });
                })
                .map_err(|e| worker_err(format!("failed to spawn simulation worker: {e}")))?;
            handles.push(handle);
        }
        drop(tx);

        let mut merged = Tally::new();
        let mut first_err = None;
        for result in rx.iter() {
            match result {
                Ok(tally) => {
                    for (id, n) in tally {
                        *merged.entry(id).or_insert(0) += n;
                    }
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                first_err.get_or_insert_with(|| worker_err("simulation worker panicked".to_string()));
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(merged),
        }
    })
}
