//! Flag arbitration
//!
//! The [`Arbiter`] is the only owner of the stored track flag. Every flag report
//! from the active adapter passes through [`Arbiter::set_active_flag`], which
//! applies these rules in order:
//!
//! 1. Clear and Chequered always replace the stored flag and are broadcast, even
//!    when they equal it, so display overlays get reset.
//! 2. A report equal to the stored flag, or [`Flag::None`], does nothing.
//! 3. On a clear track, information flags (Blue, Surface, BlackWhite) are
//!    broadcast as an overlay without being stored.
//! 4. A status flag ranking below the stored flag is dropped.
//! 5. Anything else is stored and broadcast.
//!
//! For rule 4 a stored Clear ranks below every status flag and a stored Chequered
//! ranks above all of them: once a session is chequered only an override moves
//! the track on.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::broadcast::Broadcast;
use crate::{Flag, FlagData, OutboundEvent};

/// Outcome of arbitrating one report against the stored flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Override flag: stored and broadcast unconditionally.
    Override,
    /// Stored and broadcast.
    Store,
    /// Broadcast only; stored flag untouched.
    Overlay,
    /// Same flag as stored, or no flag at all.
    Unchanged,
    /// Ranked below the stored flag.
    Suppressed,
}

impl Decision {
    pub fn broadcasts(self) -> bool {
        matches!(self, Decision::Override | Decision::Store | Decision::Overlay)
    }

    pub fn stores(self) -> bool {
        matches!(self, Decision::Override | Decision::Store)
    }
}

/// Rank of the stored flag when a status flag tries to replace it.
fn stored_rank(flag: Flag) -> u8 {
    match flag {
        Flag::Clear | Flag::None => 0,
        Flag::Chequered => u8::MAX,
        other => other.priority().unwrap_or(0),
    }
}

/// Apply the arbitration rules without touching any state.
pub fn arbitrate(current: &FlagData, incoming: &FlagData) -> Decision {
    if incoming.flag().is_override() {
        return Decision::Override;
    }

    if incoming.flag() == current.flag() || incoming.flag() == Flag::None {
        return Decision::Unchanged;
    }

    let priority = incoming.flag().priority().unwrap_or(0);
    if current.flag() == Flag::Clear && priority == 0 {
        return Decision::Overlay;
    }

    if priority < stored_rank(current.flag()) {
        return Decision::Suppressed;
    }

    Decision::Store
}

/// Read-only view of the stored flag, handed to parsers that need it.
#[derive(Clone)]
pub struct FlagView {
    state: watch::Receiver<FlagData>,
}

impl FlagView {
    pub fn current(&self) -> FlagData {
        *self.state.borrow()
    }

    pub fn flag(&self) -> Flag {
        self.state.borrow().flag()
    }
}

/// Sole owner of the canonical current flag.
pub struct Arbiter {
    state: watch::Sender<FlagData>,
    output: Arc<dyn Broadcast>,
}

impl Arbiter {
    pub fn new(initial: Flag, output: Arc<dyn Broadcast>) -> Self {
        let (state, _) = watch::channel(FlagData::new(initial));
        info!(flag = %initial, "Arbiter initialised");
        Self { state, output }
    }

    /// Arbitrate a report, update the stored flag and broadcast as required.
    pub fn set_active_flag(&self, incoming: FlagData) -> Decision {
        let mut decision = Decision::Unchanged;
        self.state.send_if_modified(|current| {
            decision = arbitrate(current, &incoming);
            if decision.stores() {
                *current = incoming;
            }
            // Overrides re-notify watchers even when the value is unchanged.
            decision.stores()
        });

        match decision {
            Decision::Override | Decision::Store => {
                info!(flag = %incoming.flag(), driver = ?incoming.driver(), ?decision, "Track flag changed");
            }
            Decision::Overlay => {
                info!(flag = %incoming.flag(), driver = ?incoming.driver(), "Information flag shown");
            }
            Decision::Unchanged | Decision::Suppressed => {
                debug!(flag = %incoming.flag(), current = %self.current().flag(), ?decision, "Flag report ignored");
            }
        }

        if decision.broadcasts() {
            self.output.broadcast(OutboundEvent::FlagChange(incoming));
        }
        decision
    }

    /// The stored flag.
    pub fn current(&self) -> FlagData {
        *self.state.borrow()
    }

    pub fn view(&self) -> FlagView {
        FlagView { state: self.state.subscribe() }
    }

    /// Stream of stored-flag changes, starting with the current value.
    ///
    /// Overlays are not stored and therefore never appear here.
    pub fn updates(&self) -> impl Stream<Item = FlagData> + 'static {
        WatchStream::new(self.state.subscribe())
    }
}
