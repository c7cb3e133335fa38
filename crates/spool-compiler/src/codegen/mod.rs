//! Génération de bytecode : chunks, classes et attribution des emplacements.

mod generator;
pub mod scope;

pub use generator::BytecodeGenerator;
