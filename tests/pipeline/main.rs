#[path = "../support/mod.rs"]
mod support;

mod delivery;
mod end_to_end;
mod threaded;
