//! Domain types for fvglab

pub mod bar;
pub mod gap;
pub mod ids;
pub mod signal;

pub use bar::{Bar, BarError};
pub use gap::{round2, Direction, Gap, GapKind};
pub use ids::{GapId, IdGen, TradeUid};
pub use signal::TradeSignal;
