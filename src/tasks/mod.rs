pub mod session_sweeper;
pub mod stats_refresher;
