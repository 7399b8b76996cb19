//! Named exclusive areas.
//!
//! Every piece of state that is touched from both task and interrupt context
//! lives inside an [`ExclusiveArea`]. The area is entered for the duration
//! of a closure and left on every exit path. No driver call or notification
//! may be issued from inside the closure.

use core::cell::RefCell;

use critical_section::Mutex;

/// The regions guarding cross-cutting invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    /// Consistency of controller mode and link state flags.
    LinkState,
    /// Short sections around counters and flags.
    ExclusiveArea0,
    /// Reception paths racing the state machines of a port.
    Rx,
    /// Pending frames awaiting switch management information.
    Tx,
}

pub(crate) struct ExclusiveArea<T> {
    region: Region,
    inner: Mutex<RefCell<T>>,
}

impl<T> ExclusiveArea<T> {
    pub(crate) const fn new(region: Region, value: T) -> Self {
        Self {
            region,
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| {
            tracing::trace!(region = ?self.region, "enter exclusive area");
            let mut guard = self.inner.borrow_ref_mut(cs);
            f(&mut *guard)
        })
    }
}

impl<T: Copy> ExclusiveArea<T> {
    pub(crate) fn get(&self) -> T {
        self.with(|value| *value)
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for ExclusiveArea<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        critical_section::with(|cs| {
            f.debug_struct("ExclusiveArea")
                .field("region", &self.region)
                .field("value", &*self.inner.borrow_ref(cs))
                .finish()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_survives_between_sections() {
        let area = ExclusiveArea::new(Region::ExclusiveArea0, 0u32);
        area.with(|v| *v += 3);
        area.with(|v| *v *= 2);
        assert_eq!(area.get(), 6);
    }

    #[test]
    fn closure_result_is_returned() {
        let area = ExclusiveArea::new(Region::Rx, vec![1, 2, 3]);
        let popped = area.with(|v| v.pop());
        assert_eq!(popped, Some(3));
        assert_eq!(area.with(|v| v.len()), 2);
    }
}
