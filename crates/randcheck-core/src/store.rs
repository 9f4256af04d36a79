//! Append-only, chunked result storage.
//!
//! Each test owns two stores: one private-statistics record per iteration and
//! `partitions` p-values per iteration. Stores are pre-sized at init to the
//! full run, so growth during the iterate phase should never happen; when it
//! does, capacity grows by whole chunks and every size computation is checked
//! before memory is requested.
//!
//! A store is not synchronized. Callers that append from several threads must
//! hold a lock around every append (see [`crate::driver`]).

use std::mem;

use crate::error::{Error, Result};

/// Default growth chunk, in elements.
pub const DEFAULT_CHUNK: usize = 1024;

/// Typed, append-only growable container.
#[derive(Debug, Clone)]
pub struct ResultStore<T> {
    data: Vec<T>,
    chunk: usize,
    growths: usize,
}

impl<T> ResultStore<T> {
    /// An empty store with no allocation.
    pub fn new(chunk: usize) -> Self {
        Self {
            data: Vec::new(),
            chunk: chunk.max(1),
            growths: 0,
        }
    }

    /// Create a store growing by `chunk` elements, with room for `hint`
    /// elements up front.
    pub fn with_capacity(chunk: usize, hint: usize) -> Result<Self> {
        let chunk = chunk.max(1);
        checked_bytes::<T>(hint)?;
        let mut data = Vec::new();
        data.try_reserve_exact(hint)
            .map_err(|_| Error::StoreAlloc { count: hint })?;
        Ok(Self {
            data,
            chunk,
            growths: 0,
        })
    }

    /// Copy `value` into the next free slot, growing by one chunk if full.
    pub fn append(&mut self, value: T) -> Result<()> {
        if self.data.len() == self.data.capacity() {
            self.grow()?;
        }
        self.data.push(value);
        Ok(())
    }

    fn grow(&mut self) -> Result<()> {
        let capacity = self.data.capacity();
        let target = capacity.checked_add(self.chunk).ok_or(Error::StoreOverflow {
            count: capacity,
            element_size: mem::size_of::<T>(),
        })?;
        checked_bytes::<T>(target)?;
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| Error::StoreAlloc { count: target })?;
        self.growths += 1;
        log::debug!(
            "result store grew to {} elements ({} growths)",
            self.data.capacity(),
            self.growths
        );
        Ok(())
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    /// Elements from `index` to the end; the read-only address of a slot.
    pub fn addr(&self, index: usize) -> Option<&[T]> {
        self.data.get(index..)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk
    }

    /// Number of times the backing allocation was extended after creation.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Clone> ResultStore<T> {
    /// Append every element of `values`, in order.
    pub fn append_slice(&mut self, values: &[T]) -> Result<()> {
        for v in values {
            self.append(v.clone())?;
        }
        Ok(())
    }
}

/// Reject element counts whose byte size would not fit in `isize`.
fn checked_bytes<T>(count: usize) -> Result<usize> {
    let element_size = mem::size_of::<T>();
    count
        .checked_mul(element_size)
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(Error::StoreOverflow {
            count,
            element_size,
        })
}

/// `iterations × partitions`, checked.
pub fn presize(iterations: usize, partitions: usize) -> Result<usize> {
    iterations
        .checked_mul(partitions)
        .ok_or(Error::StoreOverflow {
            count: iterations,
            element_size: partitions,
        })
}
