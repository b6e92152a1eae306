//! Domain types for GapDesk

pub mod bar;
pub mod option;
pub mod position;
pub mod quote;
pub mod score;
pub mod signal;

pub use bar::Bar;
pub use option::{Greeks, OptionContract, OptionType};
pub use position::{PositionRecord, PriceTargets, TradeType};
pub use quote::Quote;
pub use score::{AnalyzerResult, DataSource, PointsComponent};
pub use signal::{Confidence, Direction, Signal, TradeDecision};
