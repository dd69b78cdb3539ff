#![doc = include_str!("../README.md")]

pub mod capacity;
pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod processor;
pub mod rank;
pub mod schedule;
pub mod scheduler;
pub mod task;
