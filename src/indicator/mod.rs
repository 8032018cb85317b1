pub mod ewm;
pub mod rolling_std;
pub mod rsi;

pub use ewm::Ewm;
pub use rolling_std::RollingStd;
pub use rsi::WilderRsi;
