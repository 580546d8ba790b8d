//! An Intcode machine, as used throughout Advent of Code 2019.
//!
//! A [`Machine`] runs a program image until it produces an output, needs an
//! input it does not have, or halts. Several machines can be driven side by
//! side by moving the outputs of one into the input of another.
//!
//! ```rust
//! use intcode_machine::{Machine, Yield};
//!
//! let mut machine = Machine::new(&[3, 0, 4, 0, 99]);
//! assert_eq!(machine.poll()?, Yield::AwaitingInput);
//! machine.feed([42]);
//! assert_eq!(machine.resume()?, Some(42));
//! assert_eq!(machine.resume()?, None);
//! assert!(machine.is_halted());
//! # Ok::<(), intcode_machine::MachineError>(())
//! ```

pub mod machine;

pub use machine::{Machine, MachineError, State, Value, Yield, parse_program};
