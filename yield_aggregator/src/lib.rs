mod api;
mod apy;
mod canister;
mod constants;
mod journal;
mod position;
mod protocol;
mod settings;
mod state;
mod types;
mod utils;

pub use canister::YieldAggregator;
