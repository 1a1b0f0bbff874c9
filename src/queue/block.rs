//! The ring-block chain backing one priority queue.
//!
//! Fixed-capacity, page-sized blocks are linked into a chain; a block is
//! freed once fully drained, except the first, which is kept around and its
//! indices reset to zero so steady-state traffic never re-allocates. This
//! is built from a [`VecDeque`] of [`Block`]s instead of raw `next`
//! pointers so the chain stays safe.

use std::collections::VecDeque;

use super::Task;

/// Tasks per block, chosen so that a block plus its bookkeeping is roughly
/// one page (mirrors `fio.h`'s `FIO_TASK_QUEUE_BLOCK_COUNT` sizing rationale).
pub(super) const BLOCK_CAPACITY: usize = 255;

pub(super) struct Block {
    tasks: Vec<Option<Task>>,
    write: usize,
    read: usize,
    len: usize,
}

impl Block {
    fn new() -> Block {
        let mut tasks = Vec::with_capacity(BLOCK_CAPACITY);
        tasks.resize_with(BLOCK_CAPACITY, || None);
        Block {
            tasks,
            write: 0,
            read: 0,
            len: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.len == BLOCK_CAPACITY
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, task: Task) {
        debug_assert!(!self.is_full());
        self.tasks[self.write] = Some(task);
        self.write = (self.write + 1) % BLOCK_CAPACITY;
        self.len += 1;
    }

    fn pop(&mut self) -> Task {
        debug_assert!(!self.is_empty());
        let task = self.tasks[self.read].take().expect("ring slot desynced");
        self.read = (self.read + 1) % BLOCK_CAPACITY;
        self.len -= 1;
        task
    }

    fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
    }
}

/// A chain of [`Block`]s forming one FIFO queue.
pub(super) struct BlockChain {
    blocks: VecDeque<Block>,
    len: usize,
}

impl BlockChain {
    pub(super) fn new() -> BlockChain {
        let mut blocks = VecDeque::with_capacity(1);
        blocks.push_back(Block::new());
        BlockChain { blocks, len: 0 }
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    pub(super) fn push(&mut self, task: Task) {
        if self.blocks.back().map_or(true, Block::is_full) {
            self.blocks.push_back(Block::new());
        }
        self.blocks.back_mut().unwrap().push(task);
        self.len += 1;
    }

    pub(super) fn pop(&mut self) -> Option<Task> {
        loop {
            let front = self.blocks.front_mut()?;
            if front.is_empty() {
                if self.blocks.len() > 1 {
                    self.blocks.pop_front();
                    continue;
                }
                front.reset();
                return None;
            }
            let task = front.pop();
            self.len -= 1;
            if front.is_empty() && self.blocks.len() > 1 {
                self.blocks.pop_front();
            } else if front.is_empty() {
                front.reset();
            }
            return Some(task);
        }
    }

    /// Drops every queued task without running it (used when a forked child
    /// clears work it inherited from the parent's pre-fork queues).
    pub(super) fn clear(&mut self) {
        self.blocks.clear();
        self.blocks.push_back(Block::new());
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>, value: usize) -> Task {
        let counter = Arc::clone(counter);
        Task::new(move || {
            counter.fetch_add(value, Ordering::SeqCst);
        })
    }

    #[test]
    fn fifo_across_block_boundary() {
        let mut chain = BlockChain::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..BLOCK_CAPACITY + 10 {
            let order = Arc::clone(&order);
            chain.push(Task::new(move || order.lock().unwrap().push(i)));
        }
        assert_eq!(chain.len(), BLOCK_CAPACITY + 10);
        while let Some(task) = chain.pop() {
            task.run();
        }
        let observed = order.lock().unwrap();
        let expected: Vec<usize> = (0..BLOCK_CAPACITY + 10).collect();
        assert_eq!(*observed, expected);
        let _ = counting_task(&counter, 0);
    }

    #[test]
    fn drained_chain_collapses_to_one_block() {
        let mut chain = BlockChain::new();
        for _ in 0..BLOCK_CAPACITY * 3 {
            chain.push(Task::new(|| {}));
        }
        while chain.pop().is_some() {}
        assert_eq!(chain.blocks.len(), 1);
    }
}
