//! Reference-counted node arena.
//!
//! Every term node lives in a slot of a [`Pool`]. Slots never move, so a
//! [`NodeId`] stays valid for as long as the node is alive; each free bumps the
//! slot's generation so a handle outliving its node is caught on access rather
//! than aliasing whatever gets allocated there next.

use thiserror::Error;

use crate::term::{Child, Term};

const MIN_BLOCK: usize = 16;
const MAX_SUGGESTED_BLOCK: usize = 1024;
const DOUBLING_LIMIT: usize = 2048;
const FIXED_BLOCK: usize = 4096;

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Error, PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[error("Out of memory: the node pool cannot grow any further.")]
pub struct OutOfMemory;

#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Size of the first block; clamped to `16..=1024`.
    pub block: usize,
    /// Hard limit on the number of slots, if any.
    pub max_nodes: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            block: MIN_BLOCK,
            max_nodes: None,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Free { next: Option<u32> },
    Live { term: Term, refs: usize },
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    slot: Slot,
}

#[derive(Debug)]
pub struct Pool {
    entries: Vec<Entry>,
    free: Option<u32>,
    available: usize,
    next_block: usize,
    max_nodes: Option<usize>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            entries: Vec::new(),
            free: None,
            available: 0,
            next_block: config.block.clamp(MIN_BLOCK, MAX_SUGGESTED_BLOCK),
            max_nodes: config.max_nodes,
        }
    }

    /// Number of live nodes.
    pub fn live(&self) -> usize {
        self.entries.len() - self.available
    }

    /// Number of slots on the free list.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Total number of slots, live or free.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Makes sure at least `needed` slots are free, growing by one block if not.
    pub fn reserve(&mut self, needed: usize) -> Result<(), OutOfMemory> {
        if needed <= self.available {
            return Ok(());
        }
        let wanted = needed - self.available;
        let mut block = wanted.max(self.next_block);
        if let Some(max_nodes) = self.max_nodes {
            let room = max_nodes.saturating_sub(self.entries.len());
            if room < wanted {
                return Err(OutOfMemory);
            }
            block = block.min(room);
        }
        let start = self.entries.len();
        let end = start.checked_add(block).ok_or(OutOfMemory)?;
        if end > u32::MAX as usize {
            return Err(OutOfMemory);
        }
        self.entries
            .try_reserve_exact(block)
            .map_err(|_| OutOfMemory)?;
        self.next_block = if block < DOUBLING_LIMIT {
            block * 2
        } else {
            FIXED_BLOCK
        };

        let tail = self.free;
        self.entries.extend((start..end).map(|i| Entry {
            generation: 0,
            slot: Slot::Free {
                next: if i + 1 < end { Some(i as u32 + 1) } else { tail },
            },
        }));
        self.free = Some(start as u32);
        self.available += block;
        log::debug!(
            "node pool grew by {block} slots to {} (next block {})",
            self.entries.len(),
            self.next_block
        );
        Ok(())
    }

    /// Allocates a node with a strong count of one.
    pub fn try_allocate(&mut self, term: Term) -> Result<NodeId, OutOfMemory> {
        self.reserve(1)?;
        let index = self.free.ok_or(OutOfMemory)?;
        let entry = &mut self.entries[index as usize];
        self.free = match entry.slot {
            Slot::Free { next } => next,
            Slot::Live { .. } => unreachable!("free list points at live slot {index}"),
        };
        self.available -= 1;
        entry.slot = Slot::Live { term, refs: 1 };
        Ok(NodeId {
            index,
            generation: entry.generation,
        })
    }

    /// Like [`Pool::try_allocate`], for callers with no error channel.
    ///
    /// # Panics
    ///
    /// Panics when the pool cannot grow, the same way `Vec` growth does.
    pub fn allocate(&mut self, term: Term) -> NodeId {
        match self.try_allocate(term) {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn retain(&mut self, id: NodeId) -> NodeId {
        match &mut self.entry_mut(id).slot {
            Slot::Live { refs, .. } => *refs += 1,
            Slot::Free { .. } => unreachable!(),
        }
        id
    }

    /// Drops one strong reference. Nodes reaching zero are returned to the
    /// free list and their owned children released in turn.
    pub fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let free = self.free;
            let entry = self.entry_mut(id);
            match &mut entry.slot {
                Slot::Live { refs, .. } if *refs > 1 => {
                    *refs -= 1;
                    continue;
                }
                Slot::Live { .. } => {}
                Slot::Free { .. } => unreachable!(),
            }
            let slot = std::mem::replace(&mut entry.slot, Slot::Free { next: free });
            entry.generation = entry.generation.wrapping_add(1);
            self.free = Some(id.index);
            self.available += 1;
            if let Slot::Live { term, .. } = slot {
                pending.extend(term.owned());
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Term> {
        match self.entries.get(id.index())? {
            Entry {
                generation,
                slot: Slot::Live { term, .. },
            } if *generation == id.generation => Some(term),
            _ => None,
        }
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Strong count of `id`, zero once it has been freed.
    pub fn refs(&self, id: NodeId) -> usize {
        match self.entries.get(id.index()) {
            Some(Entry {
                generation,
                slot: Slot::Live { refs, .. },
            }) if *generation == id.generation => *refs,
            _ => 0,
        }
    }

    /// Overwrites the payload of a live node, returning the old one. Reference
    /// counts of the edges involved are the caller's business.
    pub(crate) fn set(&mut self, id: NodeId, term: Term) -> Term {
        match &mut self.entry_mut(id).slot {
            Slot::Live { term: current, .. } => std::mem::replace(current, term),
            Slot::Free { .. } => unreachable!(),
        }
    }

    /// Points `child` of `parent` at `new`, taking over the caller's reference
    /// to `new` and releasing the edge it replaces.
    pub(crate) fn redirect(&mut self, parent: NodeId, child: Child, new: NodeId) {
        let term = self[parent];
        let (Some(old), Some(updated)) = (term.child(child), term.with_child(child, new)) else {
            unreachable!("{term:?} has no {child:?} edge");
        };
        self.set(parent, updated);
        self.release(old);
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut Entry {
        match self.entries.get_mut(id.index()) {
            Some(entry) if entry.generation == id.generation => entry,
            _ => panic!("stale node handle {id:?}"),
        }
    }
}

impl std::ops::Index<NodeId> for Pool {
    type Output = Term;
    fn index(&self, id: NodeId) -> &Term {
        self.get(id)
            .unwrap_or_else(|| panic!("stale node handle {id:?}"))
    }
}
