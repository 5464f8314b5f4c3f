//! Allocation maps: which endpoint executes which thread.

use std::collections::{BTreeMap, HashMap};

use crate::error::{FlowError, FlowResult};
use crate::graph::{CommGraph, ThreadRef};
use crate::types::Address;

/// A (possibly partial) binding from endpoint addresses to threads.
///
/// Addresses without an entry are emitted as unallocated endpoints. When a
/// thread is bound at more than one address, the lowest address is the one
/// other threads target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocationMap {
    by_address: BTreeMap<Address, ThreadRef>,
}

impl AllocationMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `thread` to `address`, returning the thread previously bound
    /// there, if any.
    pub fn bind(&mut self, address: Address, thread: ThreadRef) -> Option<ThreadRef> {
        self.by_address.insert(address, thread)
    }

    /// Builder-style [`AllocationMap::bind`].
    pub fn with(mut self, address: Address, thread: ThreadRef) -> Self {
        self.bind(address, thread);
        self
    }

    /// Binds every thread of `graph`, in graph order, to addresses `0..`.
    pub fn sequential(graph: &CommGraph) -> Self {
        let by_address = graph
            .threads()
            .enumerate()
            .map(|(address, t)| (address, t.thread_ref()))
            .collect();
        Self { by_address }
    }

    /// Thread bound at `address`.
    pub fn thread_at(&self, address: Address) -> Option<ThreadRef> {
        self.by_address.get(&address).copied()
    }

    /// Lowest address `thread` is bound at.
    pub fn address_of(&self, thread: ThreadRef) -> Option<Address> {
        self.by_address
            .iter()
            .find(|(_, t)| **t == thread)
            .map(|(a, _)| *a)
    }

    /// Reverse index thread -> lowest bound address.
    pub fn reverse(&self) -> HashMap<ThreadRef, Address> {
        let mut reverse = HashMap::with_capacity(self.by_address.len());
        for (address, thread) in &self.by_address {
            reverse.entry(*thread).or_insert(*address);
        }
        reverse
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Iterates over `(address, thread)` pairs in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, ThreadRef)> + '_ {
        self.by_address.iter().map(|(a, t)| (*a, *t))
    }

    /// Checks every entry against the graph and the platform size.
    pub fn validate(&self, graph: &CommGraph, total: usize) -> FlowResult<()> {
        for (address, thread) in self.iter() {
            if address >= total {
                return Err(FlowError::AddressOutOfRange { address, total });
            }
            if graph.thread(thread).is_none() {
                return Err(FlowError::UnknownThread {
                    app: thread.app,
                    thread: thread.thread,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(Address, ThreadRef)> for AllocationMap {
    fn from_iter<I: IntoIterator<Item = (Address, ThreadRef)>>(iter: I) -> Self {
        Self {
            by_address: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> CommGraph {
        let mut graph = CommGraph::new();
        let app = graph.add_application("app");
        for _ in 0..3 {
            graph.add_thread(app, None).unwrap();
        }
        graph
    }

    #[test]
    fn test_sequential_binding() {
        let map = AllocationMap::sequential(&graph());
        assert_eq!(map.len(), 3);
        assert_eq!(map.thread_at(2), Some(ThreadRef::new(0, 2)));
        assert_eq!(map.address_of(ThreadRef::new(0, 1)), Some(1));
    }

    #[test]
    fn test_lowest_address_wins() {
        let t = ThreadRef::new(0, 0);
        let map = AllocationMap::new().with(7, t).with(3, t);
        assert_eq!(map.address_of(t), Some(3));
        assert_eq!(map.reverse()[&t], 3);
    }

    #[test]
    fn test_validate_out_of_range() {
        let map = AllocationMap::new().with(9, ThreadRef::new(0, 0));
        assert!(matches!(
            map.validate(&graph(), 9),
            Err(FlowError::AddressOutOfRange { address: 9, total: 9 })
        ));
        assert!(map.validate(&graph(), 10).is_ok());
    }

    #[test]
    fn test_validate_unknown_thread() {
        let map = AllocationMap::new().with(0, ThreadRef::new(0, 5));
        assert!(matches!(
            map.validate(&graph(), 16),
            Err(FlowError::UnknownThread { app: 0, thread: 5 })
        ));
    }
}
