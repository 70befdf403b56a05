// Copyright 2025. The Somnia Agents Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! A oneshot-based shutdown signal that can be cloned and awaited by any number of tasks.
//!
//! The owner holds a [`Shutdown`] and hands out [`ShutdownSignal`]s. Triggering the shutdown, or
//! dropping the `Shutdown`, resolves every signal.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    channel::oneshot,
    future::{FutureExt, Shared},
};

/// The owning half of a shutdown signal. There is exactly one trigger per signal chain.
#[derive(Debug)]
pub struct Shutdown {
    trigger: Option<oneshot::Sender<()>>,
    signal: ShutdownSignal,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            trigger: Some(tx),
            signal: ShutdownSignal {
                inner: rx.shared(),
            },
        }
    }

    /// Resolve all signals. Subsequent calls are a no-op.
    pub fn trigger(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            let _ = trigger.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.is_none()
    }

    pub fn to_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        self.trigger();
    }
}

/// A cloneable future that resolves once the matching [`Shutdown`] is triggered or dropped.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    inner: Shared<oneshot::Receiver<()>>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// Wait for the shutdown to be triggered. Safe to call repeatedly, including after the signal
    /// has already resolved.
    pub async fn wait(&mut self) {
        if self.is_triggered() {
            return;
        }
        // A cancelled trigger (Shutdown dropped without send) also counts as shutdown.
        let _ = (&mut self.inner).await;
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_triggered() {
            return Poll::Ready(());
        }
        match self.inner.poll_unpin(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn trigger_resolves_all_signals() {
        let mut shutdown = Shutdown::new();
        let mut first = shutdown.to_signal();
        let second = shutdown.to_signal();
        assert!(!first.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());

        first.wait().await;
        second.await;
    }

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let mut shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        shutdown.to_signal().await;
    }

    #[tokio::test]
    async fn drop_triggers_signal() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();
        drop(shutdown);
        signal.wait().await;
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn wait_after_resolution_returns_immediately() {
        let mut shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();
        shutdown.trigger();
        signal.wait().await;
        signal.wait().await;
    }

    #[tokio::test]
    async fn pending_until_triggered() {
        let mut shutdown = Shutdown::new();
        let mut signal = shutdown.to_signal();

        tokio::select! {
            _ = &mut signal => panic!("signal resolved before trigger"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {},
        }

        shutdown.trigger();
        signal.wait().await;
    }
}
