// src/processing/mod.rs
//! Signal processing building blocks for ERD estimation

pub mod filters;
pub mod power;
pub mod preprocess;
pub mod reducer;
pub mod welch;
pub mod windowing;

pub use filters::{ButterworthBandpass, FilterError, SosSection};
pub use power::{mean_square, sliding_window_powers, PowerEstimator, PowerPair};
pub use preprocess::{common_average_reference, EpochPreprocessor, Preprocessing};
pub use reducer::ReducerKind;
pub use welch::{PowerSpectrum, WelchEstimator};
pub use windowing::{window_function, WindowSymmetry, WindowType};
