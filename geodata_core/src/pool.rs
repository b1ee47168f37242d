// Tiered pool of reusable node buffers.
//
// Searches need a square scratch window sized to the distance between the
// endpoints. Allocating a 500x500 node grid per query is too slow, so buffers
// are pre-declared in tiers (`SIZExCOUNT`), each slot behind its own
// `parking_lot::Mutex`. Acquisition only ever uses `try_lock`:
//
// 1. scan tiers in ascending size, skipping those smaller than required;
// 2. take the first slot that is free;
// 3. if every qualifying slot is busy, hand out a temporary buffer of the
//    smallest qualifying size and count an overflow against that tier;
// 4. if no tier is large enough, return `None` and count the request as
//    too large.
//
// Release is the guard's `Drop`, so a buffer is returned on every exit path.
// Buffer memory is allocated on the first search that uses a slot.
//
// See also: `node_buffer.rs` for the buffers, `pathfinding.rs` which is the
// only caller, `config.rs` for the tier string format.
//
// **Critical constraint: never block.** A path query must not wait for
// another thread. `acquire` never calls `lock`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::config::BufferTierSpec;
use crate::node_buffer::NodeBuffer;

#[derive(Debug, Default)]
struct TierCounters {
    uses: AtomicU64,
    player_uses: AtomicU64,
    overflows: AtomicU64,
    player_overflows: AtomicU64,
    elapsed_micros: AtomicU64,
}

#[derive(Debug)]
struct Tier {
    size: usize,
    slots: Vec<Mutex<NodeBuffer>>,
    counters: TierCounters,
}

#[derive(Debug)]
pub struct BufferPool {
    tiers: Vec<Tier>,
    too_large: AtomicU64,
}

/// A buffer lent out by the pool. Derefs to `NodeBuffer`.
pub enum BufferGuard<'a> {
    Pooled {
        tier: usize,
        guard: MutexGuard<'a, NodeBuffer>,
    },
    Temporary {
        tier: usize,
        buffer: Box<NodeBuffer>,
    },
}

impl BufferGuard<'_> {
    /// Index of the tier this buffer was charged to.
    pub fn tier(&self) -> usize {
        match self {
            BufferGuard::Pooled { tier, .. } | BufferGuard::Temporary { tier, .. } => *tier,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, BufferGuard::Temporary { .. })
    }
}

impl Deref for BufferGuard<'_> {
    type Target = NodeBuffer;

    fn deref(&self) -> &NodeBuffer {
        match self {
            BufferGuard::Pooled { guard, .. } => guard,
            BufferGuard::Temporary { buffer, .. } => buffer,
        }
    }
}

impl DerefMut for BufferGuard<'_> {
    fn deref_mut(&mut self) -> &mut NodeBuffer {
        match self {
            BufferGuard::Pooled { guard, .. } => guard,
            BufferGuard::Temporary { buffer, .. } => buffer,
        }
    }
}

impl BufferPool {
    /// Build from tier specs; tiers are kept in ascending size order.
    pub fn new(specs: &[BufferTierSpec]) -> Self {
        let mut specs = specs.to_vec();
        specs.sort_by_key(|spec| spec.size);
        let tiers = specs
            .iter()
            .map(|spec| Tier {
                size: spec.size,
                slots: (0..spec.count)
                    .map(|_| Mutex::new(NodeBuffer::new(spec.size)))
                    .collect(),
                counters: TierCounters::default(),
            })
            .collect();
        Self {
            tiers,
            too_large: AtomicU64::new(0),
        }
    }

    /// Largest window any tier can serve.
    pub fn max_size(&self) -> usize {
        self.tiers.last().map_or(0, |tier| tier.size)
    }

    /// Borrow a buffer of at least `required` cells per side. Never blocks.
    pub fn acquire(&self, required: usize, is_player: bool) -> Option<BufferGuard<'_>> {
        let mut first_fit = None;
        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.size < required {
                continue;
            }
            first_fit.get_or_insert(index);
            for slot in &tier.slots {
                if let Some(guard) = slot.try_lock() {
                    bump(&tier.counters.uses);
                    if is_player {
                        bump(&tier.counters.player_uses);
                    }
                    return Some(BufferGuard::Pooled { tier: index, guard });
                }
            }
        }

        let Some(index) = first_fit else {
            bump(&self.too_large);
            tracing::debug!(required, max = self.max_size(), "no buffer tier large enough");
            return None;
        };
        let tier = &self.tiers[index];
        bump(&tier.counters.overflows);
        if is_player {
            bump(&tier.counters.player_overflows);
        }
        tracing::debug!(required, size = tier.size, "buffer tier exhausted, using temporary buffer");
        Some(BufferGuard::Temporary {
            tier: index,
            buffer: Box::new(NodeBuffer::new(tier.size)),
        })
    }

    /// Charge search time to a tier.
    pub fn record_elapsed(&self, tier: usize, elapsed: Duration) {
        if let Some(tier) = self.tiers.get(tier) {
            let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            tier.counters.elapsed_micros.fetch_add(micros, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            tiers: self
                .tiers
                .iter()
                .map(|tier| TierStats {
                    size: tier.size,
                    slots: tier.slots.len(),
                    uses: tier.counters.uses.load(Ordering::Relaxed),
                    player_uses: tier.counters.player_uses.load(Ordering::Relaxed),
                    overflows: tier.counters.overflows.load(Ordering::Relaxed),
                    player_overflows: tier.counters.player_overflows.load(Ordering::Relaxed),
                    elapsed: Duration::from_micros(tier.counters.elapsed_micros.load(Ordering::Relaxed)),
                })
                .collect(),
            too_large: self.too_large.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ---------------------------------------------------------------------------
// Statistics snapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierStats {
    pub size: usize,
    pub slots: usize,
    pub uses: u64,
    pub player_uses: u64,
    pub overflows: u64,
    pub player_overflows: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub tiers: Vec<TierStats>,
    pub too_large: u64,
}

impl PoolStats {
    pub fn total_overflows(&self) -> u64 {
        self.tiers.iter().map(|tier| tier.overflows).sum()
    }

    pub fn total_uses(&self) -> u64 {
        self.tiers.iter().map(|tier| tier.uses).sum()
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tier in &self.tiers {
            let avg = if tier.uses + tier.overflows > 0 {
                tier.elapsed.as_micros() / u128::from(tier.uses + tier.overflows)
            } else {
                0
            };
            writeln!(
                f,
                "buffer {size}x{size} ({slots} slots): uses {uses} ({player_uses} player), \
                 overflows {overflows} ({player_overflows} player), avg {avg}us",
                size = tier.size,
                slots = tier.slots,
                uses = tier.uses,
                player_uses = tier.player_uses,
                overflows = tier.overflows,
                player_overflows = tier.player_overflows,
            )?;
        }
        write!(f, "requests too large for any buffer: {}", self.too_large)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_buffer_tiers;

    fn pool(spec: &str) -> BufferPool {
        BufferPool::new(&parse_buffer_tiers(spec).unwrap())
    }

    #[test]
    fn picks_smallest_fitting_tier() {
        let pool = pool("100x1;200x1");
        let guard = pool.acquire(120, false).unwrap();
        assert_eq!(guard.size(), 200);
        assert_eq!(guard.tier(), 1);
        assert!(!guard.is_temporary());
    }

    #[test]
    fn busy_slot_falls_through_to_next_tier() {
        let pool = pool("100x1;200x1");
        let first = pool.acquire(64, false).unwrap();
        let second = pool.acquire(64, true).unwrap();
        assert_eq!(first.size(), 100);
        assert_eq!(second.size(), 200);
        let stats = pool.stats();
        assert_eq!(stats.tiers[0].uses, 1);
        assert_eq!(stats.tiers[1].uses, 1);
        assert_eq!(stats.tiers[1].player_uses, 1);
    }

    #[test]
    fn exhausted_pool_overflows_to_temporary() {
        let pool = pool("100x1;200x1");
        let _a = pool.acquire(64, false).unwrap();
        let _b = pool.acquire(64, false).unwrap();
        let c = pool.acquire(64, true).unwrap();
        assert!(c.is_temporary());
        assert_eq!(c.size(), 100);
        let stats = pool.stats();
        assert_eq!(stats.tiers[0].overflows, 1);
        assert_eq!(stats.tiers[0].player_overflows, 1);
        assert_eq!(stats.total_overflows(), 1);
    }

    #[test]
    fn too_large_is_refused() {
        let pool = pool("100x2");
        assert!(pool.acquire(101, false).is_none());
        assert_eq!(pool.stats().too_large, 1);
    }

    #[test]
    fn drop_releases_slot() {
        let pool = pool("100x1");
        {
            let guard = pool.acquire(10, false).unwrap();
            assert!(!guard.is_temporary());
        }
        assert!(!pool.acquire(10, false).unwrap().is_temporary());
        assert_eq!(pool.stats().total_overflows(), 0);
    }

    #[test]
    fn concurrent_acquire_never_blocks() {
        let pool = pool("64x2");
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let guard = pool.acquire(64, false).unwrap();
                        assert_eq!(guard.size(), 64);
                    }
                });
            }
        });
        let stats = pool.stats();
        assert_eq!(stats.total_uses() + stats.total_overflows(), 400);
    }

    #[test]
    fn stats_display_lists_tiers() {
        let pool = pool("100x6;128x6");
        pool.record_elapsed(0, Duration::from_micros(40));
        let _g = pool.acquire(10, false);
        let text = pool.stats().to_string();
        assert!(text.contains("buffer 100x100 (6 slots): uses 1"));
        assert!(text.contains("avg 40us"));
        assert!(text.contains("buffer 128x128"));
        assert!(text.ends_with("too large for any buffer: 0"));
    }
}
