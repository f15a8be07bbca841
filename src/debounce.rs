use std::cell::RefCell;
use std::rc::Rc;

/// Something that can run a callback after a delay, and cancel it.
pub trait TimerHost {
    type Handle;

    fn arm(&self, delay_ms: u32, fire: Box<dyn FnOnce()>) -> Option<Self::Handle>;
    fn cancel(&self, handle: Self::Handle);
}

/// Coalesces bursts of triggers into one run of `action`.
///
/// Every trigger cancels the pending timer and re-arms a new one, so only
/// the last trigger of a burst fires.
pub struct Debouncer<H: TimerHost> {
    host: H,
    delay_ms: u32,
    action: Rc<dyn Fn()>,
    pending: RefCell<Option<H::Handle>>,
}

impl<H: TimerHost> Debouncer<H> {
    pub fn new(host: H, delay_ms: u32, action: impl Fn() + 'static) -> Self {
        Self {
            host,
            delay_ms,
            action: Rc::new(action),
            pending: RefCell::new(None),
        }
    }

    pub fn trigger(&self) {
        self.cancel();
        let action = Rc::clone(&self.action);
        let handle = self.host.arm(self.delay_ms, Box::new(move || action()));
        if handle.is_none() {
            log::warn!("could not arm debounce timer");
        }
        *self.pending.borrow_mut() = handle;
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            self.host.cancel(handle);
        }
    }
}
