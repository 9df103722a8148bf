#![allow(dead_code)]

pub mod frostbak_env;
pub mod transports;
