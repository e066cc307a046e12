//! Double bottom detection stages
//!
//! - **extrema**: candidate troughs (non-strict local minima of the low series)
//! - **double_bottom**: adjacent candidate pairing and neckline computation
//! - **breakout**: forward scan for the confirming close above the neckline

pub mod breakout;
pub mod double_bottom;
pub mod extrema;
pub mod helpers;

pub use breakout::*;
pub use double_bottom::*;
pub use extrema::*;
pub use helpers::*;
