pub mod agent;
pub mod cli;
pub mod device;
pub mod report;
pub mod screen;
pub mod trace;
