use std::sync::Arc;

use parking_lot::RwLock;

/// Shared mutable cell used throughout the crate for interior mutability.
pub type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

pub trait ReadExecutor<T: ?Sized> {
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R;
}

impl<T> ReadExecutor<T> for Atomic<T> {
    #[inline]
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let read_guard = self.read();
        f(&*read_guard)
    }
}

pub trait WriteExecutor<T: ?Sized> {
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> WriteExecutor<T> for Atomic<T> {
    #[inline]
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut write_guard = self.write();
        f(&mut *write_guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_read_write() {
        let cell = atomic(41);
        cell.write_with(|v| *v += 1);
        assert_eq!(cell.read_with(|v| *v), 42);
    }

    #[test]
    fn test_atomic_shared_across_clones() {
        let cell = atomic(String::from("a"));
        let other = cell.clone();
        other.write_with(|v| v.push('b'));
        assert_eq!(cell.read_with(|v| v.clone()), "ab");
    }
}
