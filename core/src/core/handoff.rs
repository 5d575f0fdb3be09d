// sluice/src/core/handoff.rs

//! Hand-off points: the typed conduits that join adjacent stages.
//!
//! A hand-off point is an `async_channel` carrying [`Parcel`]s. With the default
//! `PipelineConfig::handoff_capacity` of 0 it is a rendezvous: every parcel
//! carries a `oneshot` acknowledgement and a send only completes once a receiver
//! has taken the message. A non-zero capacity opts into that many buffered
//! slots and no acknowledgement.
//!
//! Every worker of the downstream stage holds a clone of the receiving half,
//! every worker of the upstream stage writes through an [`Emitter`], and exactly
//! one supervising task closes it. End-of-stream is the channel reporting
//! closed-and-drained; there is no sentinel message.

use crate::error::{PipelineError, PipelineResult};
use async_channel::{Receiver, Sender};
use std::sync::{Arc, OnceLock};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// One message in flight, plus the acknowledgement its sender is waiting on.
pub(crate) struct Parcel<M> {
  msg: M,
  ack: Option<oneshot::Sender<()>>,
}

impl<M> Parcel<M> {
  /// Takes the message out, releasing a sender blocked on the rendezvous.
  fn open(self) -> M {
    if let Some(ack) = self.ack {
      // The sender may have given up (cancelled or dropped); nothing to release then.
      let _ = ack.send(());
    }
    self.msg
  }
}

pub(crate) struct HandoffPoint<M> {
  pub(crate) tx: HandoffSender<M>,
  pub(crate) rx: HandoffReceiver<M>,
}

impl<M> HandoffPoint<M> {
  /// `capacity == 0` builds a rendezvous point, anything else a buffered one.
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    Self {
      tx: HandoffSender {
        tx,
        rendezvous: capacity == 0,
      },
      rx: HandoffReceiver { rx },
    }
  }
}

pub(crate) struct HandoffSender<M> {
  tx: Sender<Parcel<M>>,
  rendezvous: bool,
}

impl<M> Clone for HandoffSender<M> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
      rendezvous: self.rendezvous,
    }
  }
}

impl<M: Send> HandoffSender<M> {
  /// Delivers `msg`, waiting for a receiver to take it (rendezvous) or for a
  /// free slot (buffered).
  pub(crate) async fn send(&self, msg: M, token: &CancellationToken) -> Result<(), Halt> {
    let (parcel, taken) = if self.rendezvous {
      let (ack, taken) = oneshot::channel();
      (Parcel { msg, ack: Some(ack) }, Some(taken))
    } else {
      (Parcel { msg, ack: None }, None)
    };

    tokio::select! {
      biased;
      _ = token.cancelled() => return Err(Halt::Cancelled),
      sent = self.tx.send(parcel) => {
        if sent.is_err() {
          return Err(Halt::refused(token));
        }
      }
    }

    let Some(taken) = taken else {
      return Ok(());
    };
    tokio::select! {
      biased;
      // A receiver that already took the message wins over a late cancellation.
      acked = taken => acked.map_err(|_| Halt::refused(token)),
      _ = token.cancelled() => Err(Halt::Cancelled),
    }
  }

  pub(crate) fn close(&self) -> bool {
    self.tx.close()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

pub(crate) struct HandoffReceiver<M> {
  rx: Receiver<Parcel<M>>,
}

impl<M> Clone for HandoffReceiver<M> {
  fn clone(&self) -> Self {
    Self { rx: self.rx.clone() }
  }
}

impl<M> HandoffReceiver<M> {
  /// The next message, or `None` once the point is closed and drained.
  pub(crate) async fn recv(&self) -> Option<M> {
    self.rx.recv().await.ok().map(Parcel::open)
  }

  /// Closes the point from the receiving side and drops whatever is still
  /// queued. Senders blocked on a dropped parcel are released with a refusal.
  /// Returns how many messages were discarded.
  pub(crate) fn close_and_discard(&self) -> usize {
    self.rx.close();
    let mut discarded = 0;
    while self.rx.try_recv().is_ok() {
      discarded += 1;
    }
    discarded
  }
}

/// Why a send was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
  Cancelled,
  DownstreamClosed,
}

impl Halt {
  /// A closed point during cancellation is the cancellation's doing.
  fn refused(token: &CancellationToken) -> Self {
    if token.is_cancelled() {
      Halt::Cancelled
    } else {
      Halt::DownstreamClosed
    }
  }

  fn into_error(self, stage: usize) -> PipelineError {
    match self {
      Halt::Cancelled => PipelineError::Cancelled,
      Halt::DownstreamClosed => PipelineError::DownstreamClosed { stage },
    }
  }
}

/// The caller's end of the first hand-off point.
///
/// Closing it (explicitly with [`Input::close`], or by dropping every clone) is
/// the signal that no more input will arrive and the pipeline may drain.
pub struct Input<M> {
  tx: HandoffSender<M>,
  token: CancellationToken,
}

impl<M> Clone for Input<M> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
      token: self.token.clone(),
    }
  }
}

impl<M: Send> Input<M> {
  pub(crate) fn new(tx: HandoffSender<M>, token: CancellationToken) -> Self {
    Self { tx, token }
  }

  /// Sends one message into the first stage. With the default rendezvous
  /// hand-off this returns only after a first-stage worker has taken it.
  ///
  /// Fails with `Cancelled` once the pipeline's token fires and with
  /// `InputClosed` if the input was closed or the first stage has no workers left.
  pub async fn send(&self, msg: M) -> PipelineResult<()> {
    self.tx.send(msg, &self.token).await.map_err(|halt| match halt {
      Halt::Cancelled => PipelineError::Cancelled,
      Halt::DownstreamClosed => PipelineError::InputClosed,
    })
  }

  /// Closes the input. Returns `false` if it was already closed.
  pub fn close(&self) -> bool {
    self.tx.close()
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

/// Write access to a stage's output hand-off point.
///
/// Producers receive one per input message and may emit any number of outputs
/// through it. All clones handed to one worker share a halt state: once a send
/// is refused (cancellation or no downstream receivers) every later emit fails fast.
pub struct Emitter<M> {
  tx: HandoffSender<M>,
  token: CancellationToken,
  stage: usize,
  halt: Arc<OnceLock<Halt>>,
}

impl<M> Clone for Emitter<M> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
      token: self.token.clone(),
      stage: self.stage,
      halt: Arc::clone(&self.halt),
    }
  }
}

impl<M: Send> Emitter<M> {
  pub(crate) fn new(tx: HandoffSender<M>, token: CancellationToken, stage: usize) -> Self {
    Self {
      tx,
      token,
      stage,
      halt: Arc::new(OnceLock::new()),
    }
  }

  /// Hands `msg` to the next stage, waiting until it is taken (or buffered).
  pub async fn emit(&self, msg: M) -> PipelineResult<()> {
    if let Some(halt) = self.halt.get() {
      return Err(halt.into_error(self.stage));
    }
    self.tx.send(msg, &self.token).await.map_err(|halt| {
      let halt = *self.halt.get_or_init(|| halt);
      halt.into_error(self.stage)
    })
  }

  /// Index of the stage this emitter writes for.
  pub fn stage_index(&self) -> usize {
    self.stage
  }

  pub(crate) fn halted(&self) -> Option<Halt> {
    self.halt.get().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn rendezvous_send_waits_for_a_receiver() {
    let point = HandoffPoint::<u32>::new(0);
    let token = CancellationToken::new();
    let sender = point.tx.clone();
    let send_token = token.clone();
    let pending = tokio::spawn(async move { sender.send(7, &send_token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());

    assert_eq!(point.rx.recv().await, Some(7));
    assert_eq!(pending.await.unwrap(), Ok(()));
  }

  #[tokio::test]
  async fn buffered_send_returns_without_a_receiver() {
    let point = HandoffPoint::<u32>::new(1);
    let token = CancellationToken::new();
    assert_eq!(point.tx.send(7, &token).await, Ok(()));
    assert_eq!(point.rx.recv().await, Some(7));
  }

  #[tokio::test]
  async fn discarding_releases_a_blocked_sender() {
    let point = HandoffPoint::<u32>::new(0);
    let token = CancellationToken::new();
    let sender = point.tx.clone();
    let send_token = token.clone();
    let pending = tokio::spawn(async move { sender.send(7, &send_token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(point.rx.close_and_discard(), 1);
    assert_eq!(pending.await.unwrap(), Err(Halt::DownstreamClosed));
    assert_eq!(point.tx.send(8, &token).await, Err(Halt::DownstreamClosed));
  }

  #[tokio::test]
  async fn refusal_during_cancellation_reads_as_cancelled() {
    let point = HandoffPoint::<u32>::new(0);
    let token = CancellationToken::new();
    point.rx.close_and_discard();
    token.cancel();
    assert_eq!(point.tx.send(1, &token).await, Err(Halt::Cancelled));
  }
}
