//! Shared helpers for cadence-api integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;
