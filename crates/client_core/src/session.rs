use shared::domain::Address;

/// Explicit wallet session context. One active address at a time; absence of
/// an address is a normal state, not an error. Injected into the client
/// rather than living in a process-wide singleton.
#[derive(Debug, Default)]
pub struct Session {
    address: Option<Address>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Sets the active address. Returns false when the same address was
    /// already connected (idempotent no-op).
    pub fn connect(&mut self, address: Address) -> bool {
        if self.address.as_ref() == Some(&address) {
            return false;
        }
        self.address = Some(address);
        true
    }

    /// Clears the active address. Returns false when already disconnected.
    pub fn disconnect(&mut self) -> bool {
        self.address.take().is_some()
    }
}
