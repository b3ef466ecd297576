pub mod rssi;

pub use rssi::RssiFilter;
