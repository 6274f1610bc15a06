pub mod dice;
pub mod error;
pub mod spec;
pub mod state;

pub use dice::{Dice, ScriptedDice, StdDice};
pub use error::PetError;
pub use spec::{ActionKind, ActionTable, DEFAULT_SPECIES};
pub use state::{HungerState, Pet, SleepState, Surroundings};
