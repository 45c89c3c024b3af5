pub mod capture_source;
pub mod meter_delegate;
