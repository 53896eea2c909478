//! Counting semaphore shared between task and interrupt context

use core::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use critical_section::Mutex;

struct State {
    count: u32,
    waker: Option<Waker>,
}

/// Counts retired buffers that nobody has collected
///
/// The interrupt handler [`post`](Semaphore::post)s; the application
/// awaits [`pend`](Semaphore::pend).
pub(crate) struct Semaphore {
    state: Mutex<RefCell<State>>,
}

impl Semaphore {
    pub(crate) const fn new() -> Self {
        Semaphore {
            state: Mutex::new(RefCell::new(State {
                count: 0,
                waker: None,
            })),
        }
    }

    /// Drop any count and waiter
    pub(crate) fn reset(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.count = 0;
            state.waker = None;
        });
    }

    /// Increment the count, and wake the waiter
    pub(crate) fn post(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.count = state.count.saturating_add(1);
            if let Some(waker) = state.waker.take() {
                waker.wake();
            }
        });
    }

    /// Wait for the count to be non-zero, then decrement it
    pub(crate) fn pend(&self) -> Pend<'_> {
        Pend { semaphore: self }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).count)
    }
}

/// Resolves once the semaphore is taken
pub(crate) struct Pend<'a> {
    semaphore: &'a Semaphore,
}

impl Future for Pend<'_> {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        critical_section::with(|cs| {
            let mut state = self.semaphore.state.borrow_ref_mut(cs);
            if state.count > 0 {
                state.count -= 1;
                state.waker = None;
                Poll::Ready(())
            } else {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        })
    }
}
