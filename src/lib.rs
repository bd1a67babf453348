//! Chainline: compiles DAW method-chain scripts into ordered actions.
//!
//! A script such as
//!
//! ```text
//! track(instrument="Serum").new_clip(bar=1, length_bars=4).add_midi(notes=[60, 64, 67])
//! for_each(filter(tracks, track.name.contains("Bass")), @add_fx(fxname="ReaEQ"))
//! ```
//!
//! is parsed by [`dsl::Dsl`] into a call sequence, then run by
//! [`interp::Interpreter`] against an optional [`session::SessionSnapshot`].

pub mod action;
pub mod config;
pub mod dsl;
pub mod error;
pub mod interp;
pub mod session;
pub mod value;

pub use action::{Action, ActionKind, ActionSink};
pub use config::InterpreterConfig;
pub use error::{DslError, Result};
pub use interp::{Interpretation, Interpreter, RunState};
pub use session::SessionSnapshot;
pub use value::Value;
