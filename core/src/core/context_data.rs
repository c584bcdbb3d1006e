// stepline/src/core/context_data.rs
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, interiorly mutable pipeline context.
///
/// Every handler of a run receives a clone pointing at the same data.
/// Guards are blocking and MUST NOT be held across `.await` points.
#[derive(Debug)]
pub struct ContextData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> ContextData<T> {
  pub fn new(data: T) -> Self {
    ContextData(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Read guard narrowed to one part of the context.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }

  /// Runs `f` under a read lock and returns its result; the lock is released on return.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.read())
  }

  /// Runs `f` under a write lock and returns its result; the lock is released on return.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.write())
  }
}

impl<T: Clone + Send + Sync + 'static> ContextData<T> {
  /// Owned copy of the current data.
  pub fn snapshot(&self) -> T {
    self.read().clone()
  }
}

impl<T: Send + Sync + 'static> Clone for ContextData<T> {
  fn clone(&self) -> Self {
    ContextData(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for ContextData<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
