//! Architecture-independent traits for interrupt delivery.

/// Result of offering an interrupt to a handler.
///
/// Interrupt lines may be shared; a handler that finds nothing pending for its
/// device reports `None` so the next handler on the line gets a chance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// The event did not originate from this device.
    None,
    /// The event was consumed.
    Handled,
}

impl IrqReturn {
    pub fn is_handled(self) -> bool {
        self == Self::Handled
    }
}

/// IRQ handler trait.
///
/// `handle` runs in interrupt context: it must not block, allocate or take a
/// lock that a worker may hold while waiting for that same interrupt.
pub trait InterruptHandler: Send + Sync {
    /// Called when interrupt fires
    fn handle(&self, irq: u32) -> IrqReturn;

    /// Optional: called during registration
    fn on_register(&self, _irq: u32) {}
}
