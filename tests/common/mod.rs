#![allow(dead_code)]

pub mod device;
pub mod inference;
pub mod screens;
