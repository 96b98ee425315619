pub mod config;
pub mod derived;
pub mod feature_table;
pub mod flatten;
pub mod game_record;
pub mod opponent;
pub mod outliers;
pub mod pipeline;
pub mod stats;
pub mod temporal;
