//! Structural validation of generated units.

use crate::{
    bytecode::{
        chunk::{Chunk, Unit},
        opcode::Instruction,
    },
    CoreError, CoreResult,
};

/// Basic structural validation of a chunk.
///
/// Operand indices must stay inside their tables, every jump point must be
/// patched, and jump targets may point at most one past the last instruction.
pub fn validate_chunk(chunk: &Chunk) -> CoreResult<()> {
    let name = &chunk.name;
    for (jp, target) in chunk.jumps.as_slice().iter().enumerate() {
        match target {
            None => return Err(CoreError::corrupted(format!("`{name}`: jump point {jp} unpatched"))),
            Some(t) if usize::from(*t) > chunk.code.len() => {
                return Err(CoreError::corrupted(format!(
                    "`{name}`: jump point {jp} targets {t} past the end ({} instructions)",
                    chunk.code.len()
                )));
            }
            Some(_) => {}
        }
    }

    for (pc, ins) in chunk.code.iter().enumerate() {
        match *ins {
            Instruction::Get { index, constant: true } if chunk.constants.get(index).is_none() => {
                return Err(CoreError::corrupted(format!(
                    "`{name}`: op {pc} references const {index} but pool size is {}",
                    chunk.constants.len()
                )));
            }
            Instruction::InstanceGet { name: n }
            | Instruction::InstanceSet { name: n }
            | Instruction::Is { name: n }
            | Instruction::Call { name: n }
            | Instruction::CallInstance { name: n }
            | Instruction::GetType { name: n }
                if chunk.names.get(n).is_none() =>
            {
                return Err(CoreError::corrupted(format!(
                    "`{name}`: op {pc} references name {n} but table size is {}",
                    chunk.names.len()
                )));
            }
            Instruction::Jump { point, .. } if usize::from(point) >= chunk.jumps.len() => {
                return Err(CoreError::corrupted(format!("`{name}`: op {pc} uses unknown jump point {point}")));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Validates every chunk of a unit.
pub fn validate_unit(unit: &Unit) -> CoreResult<()> {
    match unit {
        Unit::Chunk(c) => validate_chunk(c),
        Unit::Clazz(c) => c.constructors.iter().chain(&c.methods).try_for_each(validate_chunk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::chunk::Constant;

    #[test]
    fn accepts_well_formed_chunk() -> Result<(), Box<dyn std::error::Error>> {
        let mut c = Chunk::main();
        let k = c.constants.add(Constant::Int(1))?;
        let p = c.jumps.add_point()?;
        c.push(Instruction::Get { index: k, constant: true });
        c.push(Instruction::Jump { point: p, conditional: true });
        c.jumps.patch(p, 2)?;
        validate_chunk(&c)?;
        Ok(())
    }

    #[test]
    fn rejects_dangling_indices() {
        let mut c = Chunk::main();
        c.push(Instruction::Get { index: 3, constant: true });
        assert!(validate_chunk(&c).is_err());

        let mut c = Chunk::main();
        c.push(Instruction::CallInstance { name: 0 });
        assert!(validate_chunk(&c).is_err());

        // Locals are not checked against any table.
        let mut c = Chunk::main();
        c.push(Instruction::Get { index: 3, constant: false });
        assert!(validate_chunk(&c).is_ok());
    }
}
