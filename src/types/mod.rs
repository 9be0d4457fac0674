//! Core types shared across the crate.
//!
//! ## Overview
//!
//! - [`Flag`] is the closed set of canonical track-condition values
//! - [`FlagData`] pairs a flag with the car it concerns, if any
//! - [`Category`] identifies a timing provider
//! - [`Session`] is a scheduled session read from the session store
//! - [`AdapterState`] tracks an adapter through its lifecycle
//! - [`OutboundEvent`] is the envelope pushed to display clients
//!
//! ```rust
//! use racecontrol::{Flag, FlagData, OutboundEvent};
//!
//! let event = OutboundEvent::FlagChange(FlagData::with_driver(Flag::Blue, Some(44)));
//! assert_eq!(
//!     event.to_json().unwrap(),
//!     r#"{"event":"FlagChange","data":{"flag":"Blue","driver":44}}"#
//! );
//! ```

mod adapter_state;
mod category;
mod event;
mod flag;
mod flag_data;
mod session;

pub use adapter_state::AdapterState;
pub use category::Category;
pub use event::OutboundEvent;
pub use flag::Flag;
pub use flag_data::FlagData;
pub use session::{Session, default_chequered_threshold};
