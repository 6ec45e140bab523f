pub mod fingerprint;
pub mod hierarchy;
pub mod scaler;
pub mod screen_model;
