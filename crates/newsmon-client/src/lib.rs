pub mod hn;

pub use hn::HnClient;
