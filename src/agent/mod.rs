pub mod agent_model;
pub mod ai_model;
pub mod budget;
pub mod cancel;
pub mod completion;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod last_resort;
pub mod loop_detector;
pub mod milestone;
pub mod prompt;
pub mod reply_parser;
pub mod runner;
pub mod structural;
pub mod task;
pub mod task_state;
