//! Record storage and the active, dead and free rings.
//!
//! All records live in a single growable arena and are never freed
//! individually, only when the pollset is dropped. Each ring is an intrusive
//! doubly linked list of indices into the arena. A record is in exactly one
//! ring at any time the lock on the rings is not held.

use crate::backend::Tag;
use crate::event::{Id, Interests, Ready};
use crate::Descriptor;

/// Marker for the absence of a record in a link.
const NIL: u32 = u32::MAX;

/// Bookkeeping for a single added descriptor.
#[derive(Debug)]
pub(crate) struct Record {
    pub(crate) descriptor: Descriptor,
    pub(crate) interests: Interests,
    pub(crate) id: Id,
    /// Readiness reported by the last poll that returned this record.
    pub(crate) readiness: Ready,
    generation: u32,
    prev: u32,
    next: u32,
}

#[derive(Debug)]
struct Ring {
    head: u32,
    tail: u32,
    len: usize,
}

impl Ring {
    const fn new() -> Ring {
        Ring { head: NIL, tail: NIL, len: 0 }
    }

    fn push_back(&mut self, records: &mut [Record], index: u32) {
        let record = &mut records[index as usize];
        record.prev = self.tail;
        record.next = NIL;
        if self.tail == NIL {
            self.head = index;
        } else {
            records[self.tail as usize].next = index;
        }
        self.tail = index;
        self.len += 1;
    }

    fn unlink(&mut self, records: &mut [Record], index: u32) {
        let (prev, next) = {
            let record = &records[index as usize];
            (record.prev, record.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            records[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            records[next as usize].prev = prev;
        }
        let record = &mut records[index as usize];
        record.prev = NIL;
        record.next = NIL;
        self.len -= 1;
    }

    fn pop_front(&mut self, records: &mut [Record]) -> Option<u32> {
        let index = self.head;
        if index == NIL {
            None
        } else {
            self.unlink(records, index);
            Some(index)
        }
    }

    /// Move all records in `other` to the back of `self`, leaving `other`
    /// empty.
    fn concat(&mut self, records: &mut [Record], other: &mut Ring) {
        if other.head == NIL {
            return;
        }
        if self.tail == NIL {
            self.head = other.head;
        } else {
            records[self.tail as usize].next = other.head;
            records[other.head as usize].prev = self.tail;
        }
        self.tail = other.tail;
        self.len += other.len;
        *other = Ring::new();
    }

    fn iter<'a>(&self, records: &'a [Record]) -> RingIter<'a> {
        RingIter { records, next: self.head }
    }
}

struct RingIter<'a> {
    records: &'a [Record],
    next: u32,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next == NIL {
            None
        } else {
            let index = self.next as usize;
            self.next = self.records[index].next;
            Some(index)
        }
    }
}

/// Sizes of the rings of a [`Pollset`].
///
/// [`Pollset`]: crate::Pollset
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RingStats {
    /// Number of added descriptors.
    pub active: usize,
    /// Number of removed descriptors that might still be referenced by an in
    /// progress poll.
    pub dead: usize,
    /// Number of records available for reuse.
    pub free: usize,
    /// Total number of records ever allocated, always the sum of the three
    /// rings.
    pub allocated: usize,
}

#[derive(Debug)]
pub(crate) struct Rings {
    records: Vec<Record>,
    active: Ring,
    dead: Ring,
    free: Ring,
    /// Total number of records ever moved into the dead ring.
    retired: u64,
    /// Total number of records ever moved from the dead ring to the free ring.
    reclaimed: u64,
}

impl Rings {
    pub(crate) const fn new() -> Rings {
        Rings {
            records: Vec::new(),
            active: Ring::new(),
            dead: Ring::new(),
            free: Ring::new(),
            retired: 0,
            reclaimed: 0,
        }
    }

    /// Number of records in the active ring.
    pub(crate) fn active_len(&self) -> usize {
        self.active.len
    }

    /// Take a record from the head of the free ring, or allocate a new one,
    /// and fill it. The record is in no ring until it's [activated] or
    /// [released]. Returns `None` if no more records can be addressed by a
    /// [`Tag`].
    ///
    /// [activated]: Rings::activate
    /// [released]: Rings::release
    pub(crate) fn allocate(&mut self, descriptor: Descriptor, interests: Interests, id: Id) -> Option<Tag> {
        match self.free.pop_front(&mut self.records) {
            Some(index) => {
                let record = &mut self.records[index as usize];
                record.descriptor = descriptor;
                record.interests = interests;
                record.id = id;
                record.readiness = Ready::empty();
                record.generation = record.generation.wrapping_add(1) & Tag::GENERATION_MASK;
                Some(Tag::new(index, record.generation))
            },
            None if self.records.len() >= Tag::MAX_RECORDS => None,
            None => {
                let index = self.records.len() as u32;
                self.records.push(Record {
                    descriptor,
                    interests,
                    id,
                    readiness: Ready::empty(),
                    generation: 0,
                    prev: NIL,
                    next: NIL,
                });
                Some(Tag::new(index, 0))
            },
        }
    }

    /// Add an allocated record to the tail of the active ring.
    pub(crate) fn activate(&mut self, tag: Tag) {
        self.active.push_back(&mut self.records, tag.index() as u32);
    }

    /// Return an allocated record, that never became active, to the free
    /// ring.
    pub(crate) fn release(&mut self, tag: Tag) {
        self.free.push_back(&mut self.records, tag.index() as u32);
    }

    /// Find the first active record for `descriptor`.
    pub(crate) fn find_active(&self, descriptor: Descriptor) -> Option<usize> {
        self.active.iter(&self.records)
            .find(|index| self.records[*index].descriptor.same_as(&descriptor))
    }

    pub(crate) fn record(&self, index: usize) -> &Record {
        &self.records[index]
    }

    /// Move an active record to the tail of the dead ring.
    pub(crate) fn retire(&mut self, index: usize) {
        self.active.unlink(&mut self.records, index as u32);
        self.dead.push_back(&mut self.records, index as u32);
        self.retired += 1;
    }

    /// Returns a marker of the current state of the dead ring, to be passed
    /// to [`Rings::reclaim`].
    pub(crate) fn retired(&self) -> u64 {
        self.retired
    }

    /// Move all records that were in the dead ring when `marker` was taken
    /// to the tail of the free ring. Records retired after that stay in the
    /// dead ring.
    pub(crate) fn reclaim(&mut self, marker: u64) {
        let eligible = marker.saturating_sub(self.reclaimed) as usize;
        if eligible == 0 {
            return;
        }

        if eligible >= self.dead.len {
            self.reclaimed += self.dead.len as u64;
            self.free.concat(&mut self.records, &mut self.dead);
        } else {
            // The dead ring is filled at the tail, so the records retired
            // before the marker are at the head.
            for _ in 0..eligible {
                if let Some(index) = self.dead.pop_front(&mut self.records) {
                    self.free.push_back(&mut self.records, index);
                }
            }
            self.reclaimed += eligible as u64;
        }
    }

    /// Resolve a tag returned by the backend into a record, `None` if the tag
    /// is stale or invalid.
    pub(crate) fn resolve(&mut self, tag: Tag) -> Option<&mut Record> {
        self.records.get_mut(tag.index())
            .filter(|record| record.generation == tag.generation())
    }

    pub(crate) fn stats(&self) -> RingStats {
        RingStats {
            active: self.active.len,
            dead: self.dead.len,
            free: self.free.len,
            allocated: self.records.len(),
        }
    }
}
