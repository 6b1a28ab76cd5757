pub mod charge_state;
pub mod command;
pub mod force_charge;
pub mod history;

pub use charge_state::*;
pub use command::*;
pub use force_charge::*;
pub use history::*;
