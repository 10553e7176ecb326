pub mod commands;
pub mod renderer;
