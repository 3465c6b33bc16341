pub mod types;
pub mod frame;
pub mod preprocess;
pub mod screening;
pub mod expert;
pub mod escalation;
pub mod capture;
pub mod live;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::*;
