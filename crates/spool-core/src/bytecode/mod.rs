//! Bytecode for the Spool VM: opcode table, chunk/class units, the hybrid
//! text-header + binary-body wire format, and tooling helpers.

/// Opcodes and instruction encoding.
pub mod opcode;
/// Chunks, classes, tables and wire serialization.
pub mod chunk;
/// Wire format reader.
pub mod reader;
/// Structural validation.
pub mod helpers;
/// Textual listings.
pub mod disasm;

pub use chunk::{
    encode_units, Chunk, ChunkError, ChunkKind, Clazz, ConstPool, Constant, JumpTable, NameTable, Property, Unit,
};
pub use opcode::{Instruction, Opcode};
pub use reader::read_units;
