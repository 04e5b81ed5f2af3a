#![cfg(test)]

mod config;
mod layer;
