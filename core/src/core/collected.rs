// sluice/src/core/collected.rs
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A shared result buffer for the common "just give me everything" collector.
///
/// `sink()` yields a collector closure suitable for `Pipeline::run`; the buffer
/// itself stays readable from the caller's side while the pipeline drains.
///
/// Guards obtained from [`Collected::lock`] are blocking and must not be held
/// across `.await` points.
#[derive(Debug)]
pub struct Collected<M>(Arc<Mutex<Vec<M>>>);

impl<M: Send + 'static> Collected<M> {
  pub fn new() -> Self {
    Collected(Arc::new(Mutex::new(Vec::new())))
  }

  /// A collector that appends every result to this buffer.
  pub fn sink(&self) -> impl FnMut(M) + Send + 'static {
    let buffer = Arc::clone(&self.0);
    move |msg| buffer.lock().push(msg)
  }

  pub fn len(&self) -> usize {
    self.0.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.lock().is_empty()
  }

  pub fn lock(&self) -> MutexGuard<'_, Vec<M>> {
    self.0.lock()
  }

  /// Moves every collected result out, leaving the buffer empty.
  pub fn take(&self) -> Vec<M> {
    std::mem::take(&mut *self.0.lock())
  }

  pub fn snapshot(&self) -> Vec<M>
  where
    M: Clone,
  {
    self.0.lock().clone()
  }
}

impl<M> Clone for Collected<M> {
  fn clone(&self) -> Self {
    Collected(Arc::clone(&self.0))
  }
}

impl<M: Send + 'static> Default for Collected<M> {
  fn default() -> Self {
    Self::new()
  }
}
