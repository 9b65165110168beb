pub mod handlers;
mod service;

pub use service::{RainWatch, SchedulerError, SchedulerService};
