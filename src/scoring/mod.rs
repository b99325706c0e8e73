pub mod report;
pub mod session;
pub mod timing;
pub mod types;
