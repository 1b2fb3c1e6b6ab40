pub mod context;
pub mod dispatch;
pub mod import;
pub mod report;
pub mod run;
pub mod status;

pub use dispatch::dispatch;
