//! Opcode table and instruction encoding.
//!
//! One opcode byte, followed by zero, one or two operands. Boolean operands
//! take one byte (`1`/`0`), 16-bit operands take two bytes, low byte first.

use core::fmt;

use crate::{ByteReader, ByteWriter, CoreError, CoreResult};

/// Opcode byte values understood by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Push `true`.
    GetTrue = 0,
    /// Push `false`.
    GetFalse = 1,
    /// Pop a value into a new local slot.
    Declare = 2,
    /// Pop a value into an existing local slot.
    Set = 3,
    /// Push a constant or a local.
    Get = 4,
    /// Instantiate the type on top of the stack.
    New = 5,
    /// Read a property of the receiver.
    InstanceGet = 6,
    /// Write a property of the receiver.
    InstanceSet = 7,
    /// Build an array from the top `n` values.
    InitArray = 8,
    /// `array[index]`.
    IndexGet = 9,
    /// `array[index] = value`.
    IndexSet = 10,
    /// `+`
    Add = 11,
    /// `-`
    Subtract = 12,
    /// `*`
    Multiply = 13,
    /// `/`
    Divide = 14,
    /// `^`
    Power = 15,
    /// Unary `-`.
    NumNegate = 16,
    /// `<`
    Less = 17,
    /// `>`
    Greater = 18,
    /// `==`
    Eq = 19,
    /// `<=`
    LessEq = 20,
    /// `>=`
    GreaterEq = 21,
    /// `!=`
    NotEq = 22,
    /// `and`
    And = 23,
    /// `or`
    Or = 24,
    /// Runtime type test.
    Is = 25,
    /// `!`
    LogicNegate = 26,
    /// Jump through the chunk's jump table.
    Jump = 27,
    /// Release locals of the scope being left.
    ExitBlock = 28,
    /// Free function call.
    Call = 29,
    /// Method call on the receiver.
    CallInstance = 30,
    /// Return from the current chunk.
    Return = 31,
    /// Push a type by name.
    GetType = 32,
}

impl Opcode {
    /// Every opcode, in byte order.
    pub const ALL: [Self; 33] = [
        Self::GetTrue, Self::GetFalse, Self::Declare, Self::Set, Self::Get, Self::New,
        Self::InstanceGet, Self::InstanceSet, Self::InitArray, Self::IndexGet, Self::IndexSet,
        Self::Add, Self::Subtract, Self::Multiply, Self::Divide, Self::Power, Self::NumNegate,
        Self::Less, Self::Greater, Self::Eq, Self::LessEq, Self::GreaterEq, Self::NotEq,
        Self::And, Self::Or, Self::Is, Self::LogicNegate, Self::Jump, Self::ExitBlock,
        Self::Call, Self::CallInstance, Self::Return, Self::GetType,
    ];

    /// Decodes an opcode byte.
    pub fn from_u8(byte: u8) -> Option<Self> { Self::ALL.get(usize::from(byte)).copied() }

    /// The raw byte.
    pub const fn as_u8(self) -> u8 { self as u8 }

    /// Upper-case mnemonic used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::GetTrue => "GET_TRUE",
            Self::GetFalse => "GET_FALSE",
            Self::Declare => "DECLARE",
            Self::Set => "SET",
            Self::Get => "GET",
            Self::New => "NEW",
            Self::InstanceGet => "INSTANCE_GET",
            Self::InstanceSet => "INSTANCE_SET",
            Self::InitArray => "INIT_ARRAY",
            Self::IndexGet => "INDEX_GET",
            Self::IndexSet => "INDEX_SET",
            Self::Add => "ADD",
            Self::Subtract => "SUBTRACT",
            Self::Multiply => "MULTIPLY",
            Self::Divide => "DIVIDE",
            Self::Power => "POWER",
            Self::NumNegate => "NUM_NEGATE",
            Self::Less => "LESS",
            Self::Greater => "GREATER",
            Self::Eq => "EQ",
            Self::LessEq => "LESS_EQ",
            Self::GreaterEq => "GREATER_EQ",
            Self::NotEq => "NOT_EQ",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Is => "IS",
            Self::LogicNegate => "LOGIC_NEGATE",
            Self::Jump => "JUMP",
            Self::ExitBlock => "EXIT_BLOCK",
            Self::Call => "CALL",
            Self::CallInstance => "CALL_INSTANCE",
            Self::Return => "RETURN",
            Self::GetType => "GET_TYPE",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.mnemonic()) }
}

/// A decoded instruction with typed operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `GET_TRUE`
    GetTrue,
    /// `GET_FALSE`
    GetFalse,
    /// `DECLARE(mutable)`
    Declare {
        /// False for `const` locals.
        mutable: bool,
    },
    /// `SET(slot)`
    Set {
        /// Flattened local slot.
        slot: u16,
    },
    /// `GET(index, constant)`
    Get {
        /// Constant-pool index or local slot.
        index: u16,
        /// True when `index` addresses the constant pool.
        constant: bool,
    },
    /// `NEW(ctor)`
    New {
        /// Index of the matched constructor.
        ctor: u16,
    },
    /// `INSTANCE_GET(name)`
    InstanceGet {
        /// Name-table index of the property.
        name: u16,
    },
    /// `INSTANCE_SET(name)`
    InstanceSet {
        /// Name-table index of the property.
        name: u16,
    },
    /// `INIT_ARRAY(count)`
    InitArray {
        /// Number of elements popped.
        count: u16,
    },
    /// `INDEX_GET`
    IndexGet,
    /// `INDEX_SET`
    IndexSet,
    /// `ADD`
    Add,
    /// `SUBTRACT`
    Subtract,
    /// `MULTIPLY`
    Multiply,
    /// `DIVIDE`
    Divide,
    /// `POWER`
    Power,
    /// `NUM_NEGATE`
    NumNegate,
    /// `LESS`
    Less,
    /// `GREATER`
    Greater,
    /// `EQ`
    Eq,
    /// `LESS_EQ`
    LessEq,
    /// `GREATER_EQ`
    GreaterEq,
    /// `NOT_EQ`
    NotEq,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `IS(name)`
    Is {
        /// Name-table index of the tested type.
        name: u16,
    },
    /// `LOGIC_NEGATE`
    LogicNegate,
    /// `JUMP(point, conditional)`
    Jump {
        /// Jump-table index.
        point: u16,
        /// Taken only when the popped value is true.
        conditional: bool,
    },
    /// `EXIT_BLOCK(count)`
    ExitBlock {
        /// Locals released.
        count: u16,
    },
    /// `CALL(name)`
    Call {
        /// Name-table index of the callee.
        name: u16,
    },
    /// `CALL_INSTANCE(name)`
    CallInstance {
        /// Name-table index of the method.
        name: u16,
    },
    /// `RETURN`
    Return,
    /// `GET_TYPE(name)`
    GetType {
        /// Name-table index of the type.
        name: u16,
    },
}

impl Instruction {
    /// Opcode of this instruction.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::GetTrue => Opcode::GetTrue,
            Self::GetFalse => Opcode::GetFalse,
            Self::Declare { .. } => Opcode::Declare,
            Self::Set { .. } => Opcode::Set,
            Self::Get { .. } => Opcode::Get,
            Self::New { .. } => Opcode::New,
            Self::InstanceGet { .. } => Opcode::InstanceGet,
            Self::InstanceSet { .. } => Opcode::InstanceSet,
            Self::InitArray { .. } => Opcode::InitArray,
            Self::IndexGet => Opcode::IndexGet,
            Self::IndexSet => Opcode::IndexSet,
            Self::Add => Opcode::Add,
            Self::Subtract => Opcode::Subtract,
            Self::Multiply => Opcode::Multiply,
            Self::Divide => Opcode::Divide,
            Self::Power => Opcode::Power,
            Self::NumNegate => Opcode::NumNegate,
            Self::Less => Opcode::Less,
            Self::Greater => Opcode::Greater,
            Self::Eq => Opcode::Eq,
            Self::LessEq => Opcode::LessEq,
            Self::GreaterEq => Opcode::GreaterEq,
            Self::NotEq => Opcode::NotEq,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
            Self::Is { .. } => Opcode::Is,
            Self::LogicNegate => Opcode::LogicNegate,
            Self::Jump { .. } => Opcode::Jump,
            Self::ExitBlock { .. } => Opcode::ExitBlock,
            Self::Call { .. } => Opcode::Call,
            Self::CallInstance { .. } => Opcode::CallInstance,
            Self::Return => Opcode::Return,
            Self::GetType { .. } => Opcode::GetType,
        }
    }

    /// Encoded size in bytes.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Self::Declare { .. } => 2,
            Self::Get { .. } | Self::Jump { .. } => 4,
            Self::Set { .. }
            | Self::New { .. }
            | Self::InstanceGet { .. }
            | Self::InstanceSet { .. }
            | Self::InitArray { .. }
            | Self::Is { .. }
            | Self::ExitBlock { .. }
            | Self::Call { .. }
            | Self::CallInstance { .. }
            | Self::GetType { .. } => 3,
            _ => 1,
        }
    }

    /// Appends the encoded form to `out`.
    pub fn encode(&self, out: &mut ByteWriter) {
        out.write_u8(self.opcode().as_u8());
        match *self {
            Self::Declare { mutable } => out.write_bool(mutable),
            Self::Get { index, constant } => {
                out.write_u16_le(index);
                out.write_bool(constant);
            }
            Self::Jump { point, conditional } => {
                out.write_u16_le(point);
                out.write_bool(conditional);
            }
            Self::Set { slot: v }
            | Self::New { ctor: v }
            | Self::InstanceGet { name: v }
            | Self::InstanceSet { name: v }
            | Self::InitArray { count: v }
            | Self::Is { name: v }
            | Self::ExitBlock { count: v }
            | Self::Call { name: v }
            | Self::CallInstance { name: v }
            | Self::GetType { name: v } => out.write_u16_le(v),
            _ => {}
        }
    }

    /// Decodes one instruction.
    pub fn decode(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        let at = r.offset();
        let byte = r.read_u8()?;
        let op = Opcode::from_u8(byte)
            .ok_or_else(|| CoreError::corrupted(format!("unknown opcode {byte} at {at}")))?;
        Ok(match op {
            Opcode::GetTrue => Self::GetTrue,
            Opcode::GetFalse => Self::GetFalse,
            Opcode::Declare => Self::Declare { mutable: r.read_bool()? },
            Opcode::Set => Self::Set { slot: r.read_u16_le()? },
            Opcode::Get => Self::Get { index: r.read_u16_le()?, constant: r.read_bool()? },
            Opcode::New => Self::New { ctor: r.read_u16_le()? },
            Opcode::InstanceGet => Self::InstanceGet { name: r.read_u16_le()? },
            Opcode::InstanceSet => Self::InstanceSet { name: r.read_u16_le()? },
            Opcode::InitArray => Self::InitArray { count: r.read_u16_le()? },
            Opcode::IndexGet => Self::IndexGet,
            Opcode::IndexSet => Self::IndexSet,
            Opcode::Add => Self::Add,
            Opcode::Subtract => Self::Subtract,
            Opcode::Multiply => Self::Multiply,
            Opcode::Divide => Self::Divide,
            Opcode::Power => Self::Power,
            Opcode::NumNegate => Self::NumNegate,
            Opcode::Less => Self::Less,
            Opcode::Greater => Self::Greater,
            Opcode::Eq => Self::Eq,
            Opcode::LessEq => Self::LessEq,
            Opcode::GreaterEq => Self::GreaterEq,
            Opcode::NotEq => Self::NotEq,
            Opcode::And => Self::And,
            Opcode::Or => Self::Or,
            Opcode::Is => Self::Is { name: r.read_u16_le()? },
            Opcode::LogicNegate => Self::LogicNegate,
            Opcode::Jump => Self::Jump { point: r.read_u16_le()?, conditional: r.read_bool()? },
            Opcode::ExitBlock => Self::ExitBlock { count: r.read_u16_le()? },
            Opcode::Call => Self::Call { name: r.read_u16_le()? },
            Opcode::CallInstance => Self::CallInstance { name: r.read_u16_le()? },
            Opcode::Return => Self::Return,
            Opcode::GetType => Self::GetType { name: r.read_u16_le()? },
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.opcode().mnemonic();
        match *self {
            Self::Declare { mutable } => write!(f, "{m}({mutable})"),
            Self::Get { index, constant } => write!(f, "{m}({index}, {constant})"),
            Self::Jump { point, conditional } => write!(f, "{m}({point}, {conditional})"),
            Self::Set { slot: v }
            | Self::New { ctor: v }
            | Self::InstanceGet { name: v }
            | Self::InstanceSet { name: v }
            | Self::InitArray { count: v }
            | Self::Is { name: v }
            | Self::ExitBlock { count: v }
            | Self::Call { name: v }
            | Self::CallInstance { name: v }
            | Self::GetType { name: v } => write!(f, "{m}({v})"),
            _ => f.write_str(m),
        }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn opcode_values_are_stable() {
        assert_eq!(Opcode::GetTrue.as_u8(), 0);
        assert_eq!(Opcode::Get.as_u8(), 4);
        assert_eq!(Opcode::IndexGet.as_u8(), 9);
        assert_eq!(Opcode::IndexSet.as_u8(), 10);
        assert_eq!(Opcode::LogicNegate.as_u8(), 26);
        assert_eq!(Opcode::Jump.as_u8(), 27);
        assert_eq!(Opcode::ExitBlock.as_u8(), 28);
        assert_eq!(Opcode::GetType.as_u8(), 32);
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(usize::from(op.as_u8()), i, "{op}");
        }
        assert_eq!(Opcode::from_u8(33), None);
    }

    #[test]
    fn get_encodes_index_then_flag() {
        let mut w = ByteWriter::new();
        Instruction::Get { index: 0x0102, constant: true }.encode(&mut w);
        assert_eq!(w.as_slice(), &[4, 0x02, 0x01, 1]);
    }

    #[test]
    fn encoded_len_matches_encoding() {
        let samples = [
            Instruction::GetTrue,
            Instruction::Declare { mutable: false },
            Instruction::Jump { point: 3, conditional: true },
            Instruction::ExitBlock { count: 2 },
            Instruction::CallInstance { name: 1 },
            Instruction::Add,
        ];
        for ins in samples {
            let mut w = ByteWriter::new();
            ins.encode(&mut w);
            assert_eq!(w.len(), ins.encoded_len(), "{ins}");
        }
    }

    #[test]
    fn decode_rejects_unknown_opcode() {
        let mut r = ByteReader::new(&[200]);
        assert!(matches!(Instruction::decode(&mut r), Err(CoreError::Corrupted(_))));
    }

    #[test]
    fn display_shows_operands() {
        assert_eq!(Instruction::Get { index: 0, constant: true }.to_string(), "GET(0, true)");
        assert_eq!(Instruction::LogicNegate.to_string(), "LOGIC_NEGATE");
    }
}
