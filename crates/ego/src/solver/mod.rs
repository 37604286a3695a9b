mod moego_config;
mod moego_solver;
mod moego_state;

pub use moego_config::*;
pub use moego_solver::*;
pub use moego_state::*;
