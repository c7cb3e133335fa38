//! Bytecode units (chunks and classes) plus the hybrid wire encoding.
//!
//! A chunk serializes as an ASCII header followed by its raw instruction
//! bytes:
//!
//! ```text
//! #main(params;names;jumps;constants;len)<len bytes>
//! #func(name;params;names;jumps;constants;len)<len bytes>
//! #ctor(params;names;jumps;constants;len)<len bytes>
//! ```
//!
//! A class wraps its chunks between `#class(name;super)` and `#endclass`,
//! with one `#prop(const;name;type)` header per field.

use core::fmt;

use crate::{bytecode::opcode::Instruction, ByteWriter};

/* ─────────────────────────── Errors ─────────────────────────── */

/// Errors raised while filling or encoding a chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// A jump point was never given a target.
    #[error("jump point {point} of chunk `{chunk}` was never patched")]
    UnpatchedJump {
        /// Chunk name.
        chunk: String,
        /// Jump-table index.
        point: u16,
    },
    /// A table outgrew its 16-bit operand space.
    #[error("{table} table overflow (max {max} entries)")]
    TableOverflow {
        /// Table name (`constant`, `name`, `jump`).
        table: &'static str,
        /// Maximum entry count.
        max: usize,
    },
    /// A jump point index not present in the table.
    #[error("unknown jump point {0}")]
    UnknownJump(u16),
}

/* ─────────────────────────── Constants ─────────────────────────── */

/// Values that can live in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// 32-bit signed integer.
    Int(i32),
    /// Decoded string content (no surrounding quotes).
    Str(String),
}

impl fmt::Display for Constant {
    /// Wire rendering: decimal integers, quoted strings with `"` and `\` escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/* ─────────────────────────── Tables ─────────────────────────── */

const MAX_ENTRIES: usize = u16::MAX as usize + 1;

fn index_of(len: usize, table: &'static str) -> Result<u16, ChunkError> {
    u16::try_from(len).map_err(|_| ChunkError::TableOverflow { table, max: MAX_ENTRIES })
}

/// De-duplicated constant pool with stable indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstPool {
    values: Vec<Constant>,
}

impl ConstPool {
    /// Creates an empty pool.
    pub const fn new() -> Self { Self { values: Vec::new() } }
    /// Number of stored constants.
    pub fn len(&self) -> usize { self.values.len() }
    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    /// Stored constants in index order.
    pub fn as_slice(&self) -> &[Constant] { &self.values }
    /// Lookup by index.
    pub fn get(&self, idx: u16) -> Option<&Constant> { self.values.get(usize::from(idx)) }

    /// Returns the index of `value`, adding it first when absent.
    pub fn add(&mut self, value: Constant) -> Result<u16, ChunkError> {
        if let Some(i) = self.values.iter().position(|v| *v == value) {
            return index_of(i, "constant");
        }
        let idx = index_of(self.values.len(), "constant")?;
        self.values.push(value);
        Ok(idx)
    }
}

/// De-duplicated table of symbolic names (locals, members, types).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    /// Creates an empty table.
    pub const fn new() -> Self { Self { names: Vec::new() } }
    /// Number of names.
    pub fn len(&self) -> usize { self.names.len() }
    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
    /// Names in index order.
    pub fn as_slice(&self) -> &[String] { &self.names }
    /// Lookup by index.
    pub fn get(&self, idx: u16) -> Option<&str> { self.names.get(usize::from(idx)).map(String::as_str) }

    /// Returns the index of `name`, adding it first when absent.
    pub fn add(&mut self, name: &str) -> Result<u16, ChunkError> {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return index_of(i, "name");
        }
        let idx = index_of(self.names.len(), "name")?;
        self.names.push(name.to_owned());
        Ok(idx)
    }
}

/// Jump table: each point starts unpatched and later receives the index of
/// the instruction execution continues at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpTable {
    targets: Vec<Option<u16>>,
}

impl JumpTable {
    /// Creates an empty table.
    pub const fn new() -> Self { Self { targets: Vec::new() } }
    /// Number of points.
    pub fn len(&self) -> usize { self.targets.len() }
    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool { self.targets.is_empty() }
    /// Target of a point (`None` while unpatched).
    pub fn target(&self, point: u16) -> Option<u16> { self.targets.get(usize::from(point)).copied().flatten() }
    /// Raw targets in point order.
    pub fn as_slice(&self) -> &[Option<u16>] { &self.targets }

    /// Allocates a new unpatched point.
    pub fn add_point(&mut self) -> Result<u16, ChunkError> {
        let idx = index_of(self.targets.len(), "jump")?;
        self.targets.push(None);
        Ok(idx)
    }

    /// Allocates an already patched point (used by the wire reader).
    pub fn push_target(&mut self, target: u16) -> Result<u16, ChunkError> {
        let idx = self.add_point()?;
        self.targets[usize::from(idx)] = Some(target);
        Ok(idx)
    }

    /// Sets the target of `point`.
    pub fn patch(&mut self, point: u16, target: u16) -> Result<(), ChunkError> {
        let slot = self.targets.get_mut(usize::from(point)).ok_or(ChunkError::UnknownJump(point))?;
        *slot = Some(target);
        Ok(())
    }
}

/* ─────────────────────────── Chunk ─────────────────────────── */

/// Role of a chunk, selecting its header form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Program entry point (`#main(`).
    Main,
    /// Method (`#func(name;`).
    Function,
    /// Constructor (`#ctor(`).
    Constructor,
}

/// A compiled function, constructor or entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Header form.
    pub kind: ChunkKind,
    /// Chunk name (`main`, `constructor` or the method name).
    pub name: String,
    /// Parameter type names, `self` excluded.
    pub params: Vec<String>,
    /// Name table.
    pub names: NameTable,
    /// Jump table.
    pub jumps: JumpTable,
    /// Constant pool.
    pub constants: ConstPool,
    /// Instructions in execution order.
    pub code: Vec<Instruction>,
}

impl Chunk {
    /// Empty chunk of the given kind.
    pub fn new(kind: ChunkKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            params: Vec::new(),
            names: NameTable::new(),
            jumps: JumpTable::new(),
            constants: ConstPool::new(),
            code: Vec::new(),
        }
    }

    /// Entry point chunk.
    pub fn main() -> Self { Self::new(ChunkKind::Main, "main") }

    /// Method chunk.
    pub fn function(name: impl Into<String>) -> Self { Self::new(ChunkKind::Function, name) }

    /// Constructor chunk.
    pub fn constructor() -> Self { Self::new(ChunkKind::Constructor, "constructor") }

    /// Appends an instruction and returns its index.
    pub fn push(&mut self, ins: Instruction) -> usize {
        self.code.push(ins);
        self.code.len() - 1
    }

    /// Index the next pushed instruction will get.
    pub fn next_index(&self) -> Result<u16, ChunkError> {
        u16::try_from(self.code.len()).map_err(|_| ChunkError::TableOverflow { table: "instruction", max: MAX_ENTRIES })
    }

    /// Size of the encoded instruction stream.
    pub fn code_len(&self) -> usize { self.code.iter().map(Instruction::encoded_len).sum() }

    /// Appends the wire form of this chunk.
    pub fn write_to(&self, out: &mut ByteWriter) -> Result<(), ChunkError> {
        match self.kind {
            ChunkKind::Main => out.write_str("#main("),
            ChunkKind::Function => {
                out.write_str("#func(");
                out.write_str(&self.name);
                out.write_str(";");
            }
            ChunkKind::Constructor => out.write_str("#ctor("),
        }
        out.write_str(&self.params.join(","));
        out.write_str(";");
        out.write_str(&self.names.as_slice().join(","));
        out.write_str(";");
        let mut jumps = Vec::with_capacity(self.jumps.len());
        for (point, target) in self.jumps.as_slice().iter().enumerate() {
            let target = target.ok_or_else(|| ChunkError::UnpatchedJump {
                chunk: self.name.clone(),
                point: u16::try_from(point).unwrap_or(u16::MAX),
            })?;
            jumps.push(target.to_string());
        }
        out.write_str(&jumps.join(","));
        out.write_str(";");
        let consts: Vec<String> = self.constants.as_slice().iter().map(ToString::to_string).collect();
        out.write_str(&consts.join(","));
        out.write_str(";");
        out.write_str(&self.code_len().to_string());
        out.write_str(")");
        for ins in &self.code {
            ins.encode(out);
        }
        Ok(())
    }

    /// Wire form of this chunk alone.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChunkError> {
        let mut w = ByteWriter::new();
        self.write_to(&mut w)?;
        Ok(w.into_vec())
    }
}

/* ─────────────────────────── Clazz ─────────────────────────── */

/// Field descriptor of a class header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// `const` field.
    pub constant: bool,
    /// Field name.
    pub name: String,
    /// Field type name.
    pub type_name: String,
}

/// A compiled class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clazz {
    /// Canonical class name.
    pub name: String,
    /// Canonical superclass name (empty for the root type).
    pub super_name: String,
    /// Fields.
    pub properties: Vec<Property>,
    /// One chunk per constructor.
    pub constructors: Vec<Chunk>,
    /// One chunk per method.
    pub methods: Vec<Chunk>,
}

impl Clazz {
    /// Empty class.
    pub fn new(name: impl Into<String>, super_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: super_name.into(),
            properties: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Appends the wire form of this class.
    pub fn write_to(&self, out: &mut ByteWriter) -> Result<(), ChunkError> {
        out.write_str("#class(");
        out.write_str(&self.name);
        out.write_str(";");
        out.write_str(&self.super_name);
        out.write_str(")");
        for p in &self.properties {
            out.write_str(&format!("#prop({};{};{})", p.constant, p.name, p.type_name));
        }
        for c in &self.constructors {
            c.write_to(out)?;
        }
        for m in &self.methods {
            m.write_to(out)?;
        }
        out.write_str("#endclass");
        Ok(())
    }
}

/* ─────────────────────────── Unit ─────────────────────────── */

/// One top-level output item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// Free chunk (the entry point).
    Chunk(Chunk),
    /// Class.
    Clazz(Clazz),
}

impl Unit {
    /// Name of the unit.
    pub fn name(&self) -> &str {
        match self {
            Self::Chunk(c) => &c.name,
            Self::Clazz(c) => &c.name,
        }
    }

    /// Appends the wire form of this unit.
    pub fn write_to(&self, out: &mut ByteWriter) -> Result<(), ChunkError> {
        match self {
            Self::Chunk(c) => c.write_to(out),
            Self::Clazz(c) => c.write_to(out),
        }
    }
}

/// Concatenated wire form of `units`, in order.
pub fn encode_units(units: &[Unit]) -> Result<Vec<u8>, ChunkError> {
    let mut w = ByteWriter::new();
    for u in units {
        u.write_to(&mut w)?;
    }
    Ok(w.into_vec())
}

/* ─────────────────────────── Tests ─────────────────────────── */
