pub mod daily_worker;

pub use daily_worker::run as run_daily_worker;
