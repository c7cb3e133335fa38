//! Minimal textual disassembly helpers used by the CLI tooling.

use core::fmt::Write;

use crate::bytecode::{
    chunk::{Chunk, ChunkKind, Clazz, Unit},
    opcode::Instruction,
};

/// Produce a multi-line, human readable listing of every unit.
pub fn disassemble_units(units: &[Unit]) -> String {
    let mut out = String::new();
    for unit in units {
        match unit {
            Unit::Chunk(c) => write_chunk(&mut out, c, ""),
            Unit::Clazz(c) => write_class(&mut out, c),
        }
    }
    out
}

/// Listing of a single chunk.
pub fn disassemble_chunk(chunk: &Chunk) -> String {
    let mut out = String::new();
    write_chunk(&mut out, chunk, "");
    out
}

fn write_class(out: &mut String, clazz: &Clazz) {
    let sup = if clazz.super_name.is_empty() { "-" } else { &clazz.super_name };
    let _ = writeln!(out, "== class {} : {sup} ==", clazz.name);
    for p in &clazz.properties {
        let kw = if p.constant { "const" } else { "var" };
        let _ = writeln!(out, "  {kw} {}: {}", p.name, p.type_name);
    }
    for c in clazz.constructors.iter().chain(&clazz.methods) {
        write_chunk(out, c, "  ");
    }
    let _ = writeln!(out, "== end {} ==", clazz.name);
}

fn write_chunk(out: &mut String, chunk: &Chunk, indent: &str) {
    let kind = match chunk.kind {
        ChunkKind::Main => "main",
        ChunkKind::Function => "func",
        ChunkKind::Constructor => "ctor",
    };
    let _ = writeln!(
        out,
        "{indent}== {kind} {}({}) == (names={}, jumps={}, consts={}, ops={}, bytes={})",
        chunk.name,
        chunk.params.join(", "),
        chunk.names.len(),
        chunk.jumps.len(),
        chunk.constants.len(),
        chunk.code.len(),
        chunk.code_len(),
    );
    for (idx, value) in chunk.constants.as_slice().iter().enumerate() {
        let _ = writeln!(out, "{indent};; const[{idx:04}] = {value}");
    }
    for (pc, ins) in chunk.code.iter().enumerate() {
        match preview(chunk, ins) {
            Some(p) => {
                let _ = writeln!(out, "{indent}{pc:04}: {ins} ;; {p}");
            }
            None => {
                let _ = writeln!(out, "{indent}{pc:04}: {ins}");
            }
        }
    }
}

fn preview(chunk: &Chunk, ins: &Instruction) -> Option<String> {
    match *ins {
        Instruction::Get { index, constant: true } => chunk.constants.get(index).map(ToString::to_string),
        Instruction::InstanceGet { name }
        | Instruction::InstanceSet { name }
        | Instruction::Is { name }
        | Instruction::Call { name }
        | Instruction::CallInstance { name }
        | Instruction::GetType { name } => chunk.names.get(name).map(str::to_owned),
        Instruction::Jump { point, .. } => chunk.jumps.target(point).map(|t| format!("-> {t:04}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::chunk::Constant;

    #[test]
    fn listing_shows_constant_preview() -> Result<(), Box<dyn std::error::Error>> {
        let mut c = Chunk::main();
        let k = c.constants.add(Constant::Str("hi".into()))?;
        c.push(Instruction::Get { index: k, constant: true });
        let text = disassemble_chunk(&c);
        assert!(text.starts_with("== main main()"));
        assert!(text.contains("0000: GET(0, true) ;; \"hi\""), "{text}");
        Ok(())
    }
}
