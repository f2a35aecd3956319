//! Price collection primitives for the relayer.

pub mod store;

pub use store::{PriceStore, StoreError};
