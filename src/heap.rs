//! Bounded array-backed binary min-heap.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Ordering capability used by [`BoundedHeap`].
///
/// Implemented for every `Fn(&T, &T) -> Ordering`, so plain comparison functions like
/// [`Record::compare`](crate::Record::compare) can be used directly.
pub trait Compare<T: ?Sized> {
    fn compare(&self, left: &T, right: &T) -> Ordering;
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, left: &T, right: &T) -> Ordering {
        self(left, right)
    }
}

/// Natural ([`Ord`]) order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Compare<T> for NaturalOrder {
    fn compare(&self, left: &T, right: &T) -> Ordering {
        left.cmp(right)
    }
}

/// Heap contract violation. Any of these indicates a miscomputed heap size or position in the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// Insertion into a heap that reached its capacity.
    Full { capacity: usize },
    /// Removal from an empty heap.
    Empty,
    /// Position outside of the live region.
    InvalidPosition { pos: usize, size: usize },
    /// More elements than the heap capacity.
    SizeExceedsCapacity { size: usize, capacity: usize },
    /// Live region larger than the populated storage.
    SizeExceedsSlots { size: usize, slots: usize },
}

impl Error for HeapError {}

impl Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            HeapError::Full { capacity } => write!(f, "heap is full (capacity: {})", capacity),
            HeapError::Empty => write!(f, "heap is empty"),
            HeapError::InvalidPosition { pos, size } => {
                write!(f, "invalid heap position {} (size: {})", pos, size)
            }
            HeapError::SizeExceedsCapacity { size, capacity } => {
                write!(f, "heap size {} exceeds capacity {}", size, capacity)
            }
            HeapError::SizeExceedsSlots { size, slots } => {
                write!(f, "heap size {} exceeds populated slots {}", size, slots)
            }
        }
    }
}

/// Binary min-heap over a fixed-capacity array.
///
/// Positions `[0, size)` are live and satisfy the heap property: the children of position `p`
/// are at `2p + 1` and `2p + 2` and neither compares less than `p`. Slots past the live region keep
/// the values most recently removed, so the live region can be shrunk and regrown with
/// [`BoundedHeap::set_size`] without touching the storage.
pub struct BoundedHeap<T, C = NaturalOrder> {
    slots: Vec<T>,
    size: usize,
    capacity: usize,
    order: C,
}

impl<T: Ord> BoundedHeap<T, NaturalOrder> {
    /// Creates a heap ordered by [`Ord`]. See [`BoundedHeap::with_order`].
    pub fn new(items: Vec<T>, size: usize, capacity: usize) -> Result<Self, HeapError> {
        Self::with_order(items, size, capacity, NaturalOrder)
    }
}

impl<T, C: Compare<T>> BoundedHeap<T, C> {
    /// Creates a heap over pre-populated `items` whose first `size` elements form the live region,
    /// then restores heap order bottom-up.
    ///
    /// # Arguments
    /// * `items` - Initial heap storage, at most `capacity` elements
    /// * `size` - Number of live elements, at most `items.len()`
    /// * `capacity` - Maximum number of elements the heap can hold
    /// * `order` - Element order
    pub fn with_order(mut items: Vec<T>, size: usize, capacity: usize, order: C) -> Result<Self, HeapError> {
        if items.len() > capacity {
            return Err(HeapError::SizeExceedsCapacity {
                size: items.len(),
                capacity,
            });
        }
        if size > items.len() {
            return Err(HeapError::SizeExceedsSlots {
                size,
                slots: items.len(),
            });
        }
        items.reserve_exact(capacity - items.len());

        let mut heap = BoundedHeap {
            slots: items,
            size,
            capacity,
            order,
        };
        heap.build();

        return Ok(heap);
    }

    /// Creates an empty heap.
    pub fn empty(capacity: usize, order: C) -> Self {
        BoundedHeap {
            slots: Vec::with_capacity(capacity),
            size: 0,
            capacity,
            order,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Returns the minimum without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.size > 0 {
            self.slots.first()
        } else {
            None
        }
    }

    /// Forcefully changes the live region size. The heap may need a [`BoundedHeap::build`] afterwards.
    pub fn set_size(&mut self, size: usize) -> Result<(), HeapError> {
        if size > self.slots.len() {
            return Err(HeapError::SizeExceedsSlots {
                size,
                slots: self.slots.len(),
            });
        }
        self.size = size;

        return Ok(());
    }

    /// Restores heap order over the live region by sifting down every internal node, last one first.
    pub fn build(&mut self) {
        if self.size < 2 {
            return;
        }
        for pos in (0..=parent(self.size - 1)).rev() {
            self.sift_down(pos);
        }
    }

    /// Inserts a value.
    pub fn insert(&mut self, value: T) -> Result<(), HeapError> {
        if self.size == self.capacity {
            return Err(HeapError::Full {
                capacity: self.capacity,
            });
        }

        if self.size < self.slots.len() {
            self.slots[self.size] = value;
        } else {
            self.slots.push(value);
        }
        self.size += 1;
        self.sift_up(self.size - 1);

        return Ok(());
    }

    /// Replaces the value at `pos` and moves it to its place.
    pub fn modify(&mut self, pos: usize, value: T) -> Result<(), HeapError> {
        self.check_position(pos)?;
        self.slots[pos] = value;
        self.update(pos);

        return Ok(());
    }

    /// Consumes the heap and returns its whole storage, including slots past the live region.
    pub fn into_inner(self) -> Vec<T> {
        self.slots
    }

    fn check_position(&self, pos: usize) -> Result<(), HeapError> {
        if pos >= self.size {
            return Err(HeapError::InvalidPosition { pos, size: self.size });
        }
        return Ok(());
    }

    fn is_less(&self, left: usize, right: usize) -> bool {
        self.order.compare(&self.slots[left], &self.slots[right]) == Ordering::Less
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = parent(pos);
            // stop at the first ancestor that is not greater
            if self.order.compare(&self.slots[parent], &self.slots[pos]) != Ordering::Greater {
                return;
            }
            self.slots.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        while !is_leaf(pos, self.size) {
            let mut child = left_child(pos);
            if child + 1 < self.size && self.is_less(child + 1, child) {
                child += 1;
            }
            if !self.is_less(child, pos) {
                return;
            }
            self.slots.swap(pos, child);
            pos = child;
        }
    }

    // the new value may belong either above or below its position
    fn update(&mut self, pos: usize) {
        self.sift_up(pos);
        self.sift_down(pos);
    }
}

impl<T: Clone, C: Compare<T>> BoundedHeap<T, C> {
    /// Removes and returns the minimum.
    pub fn remove_min(&mut self) -> Result<T, HeapError> {
        if self.size == 0 {
            return Err(HeapError::Empty);
        }
        self.remove(0)
    }

    /// Removes and returns the value at `pos`. The last live value takes its place.
    pub fn remove(&mut self, pos: usize) -> Result<T, HeapError> {
        self.check_position(pos)?;

        self.size -= 1;
        if pos < self.size {
            self.slots.swap(pos, self.size);
            self.update(pos);
        }

        return Ok(self.slots[self.size].clone());
    }
}

fn parent(pos: usize) -> usize {
    (pos - 1) / 2
}

fn left_child(pos: usize) -> usize {
    2 * pos + 1
}

fn is_leaf(pos: usize, size: usize) -> bool {
    pos >= size / 2
}
