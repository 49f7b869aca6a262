#![allow(dead_code)]

pub mod component_test;
pub mod recording;
pub mod sink;
