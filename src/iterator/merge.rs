use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::Value;

static EXHAUSTED: Value = Value::Tombstone;

/// Head of one source inside the heap.
#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    key: String,
    priority: usize,
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap: reverse both fields so the smallest key
    // pops first and, among equal keys, the lowest priority number.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.priority.cmp(&self.priority))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// K-way merge of sorted sources into one sorted stream.
///
/// Sources are ordered by priority: index 0 = newest, higher indices =
/// older. Every entry of every source is yielded, in (key ASC,
/// priority ASC) order, tagged with its source index, so a key present
/// in several sources comes out newest first. Deciding which occurrence
/// wins is left to the consumer.
pub struct MergeIterator {
    sources: Vec<Box<dyn StorageIterator>>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIterator {
    pub fn new(sources: Vec<Box<dyn StorageIterator>>) -> Self {
        let heap = sources
            .iter()
            .enumerate()
            .filter(|(_, source)| source.is_valid())
            .map(|(priority, source)| HeapEntry {
                key: source.key().to_string(),
                priority,
            })
            .collect();
        MergeIterator { sources, heap }
    }

    /// Source index of the current entry (0 = newest).
    pub fn priority(&self) -> Option<usize> {
        self.heap.peek().map(|head| head.priority)
    }
}

impl StorageIterator for MergeIterator {
    fn key(&self) -> &str {
        self.heap.peek().map_or("", |head| head.key.as_str())
    }

    fn value(&self) -> &Value {
        match self.heap.peek() {
            Some(head) => self.sources[head.priority].value(),
            None => &EXHAUSTED,
        }
    }

    fn is_valid(&self) -> bool {
        !self.heap.is_empty()
    }

    fn next(&mut self) -> Result<()> {
        let Some(head) = self.heap.pop() else {
            return Ok(());
        };
        let source = &mut self.sources[head.priority];
        source.next()?;
        if source.is_valid() {
            self.heap.push(HeapEntry {
                key: source.key().to_string(),
                priority: head.priority,
            });
        }
        Ok(())
    }
}
