//! Read-only snapshot of a query result.
//!
//! Result sets are meant to be reused: every query replaces the previous
//! contents wholesale and bumps the version, so a caller can tell whether a
//! set was repopulated without comparing its items.

use std::ops::Index;

#[derive(Debug, Clone)]
pub struct ResultSet<T> {
    data: Vec<T>,
    version: u64,
}

impl<T> ResultSet<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            version: 0,
        }
    }

    /// Number of times this set has been populated.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Only the store writes into a result set.
    pub(crate) fn replace(&mut self, data: Vec<T>) {
        self.data = data;
        self.version += 1;
    }
}

impl<T: Clone> ResultSet<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for ResultSet<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
