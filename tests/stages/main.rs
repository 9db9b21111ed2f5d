#[path = "../support/mod.rs"]
mod support;

mod nemesis;
mod rating;
