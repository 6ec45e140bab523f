pub mod adb;
pub mod device_model;
