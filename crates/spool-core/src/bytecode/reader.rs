//! Reader for the hybrid wire format written by [`super::encode_units`].
//!
//! Units follow each other with no separator. A class runs from `#class(` to
//! `#endclass`; anything else must start with a chunk header. Header fields
//! are split on `;` and `,` outside double quotes, so string constants may
//! contain either.

use crate::{
    bytecode::{
        chunk::{Chunk, ChunkKind, Clazz, Constant, Property, Unit},
        opcode::Instruction,
    },
    ByteReader, CoreError, CoreResult,
};

/// Parses a whole `.spb` image back into units, in file order.
pub fn read_units(data: &[u8]) -> CoreResult<Vec<Unit>> {
    let mut r = ByteReader::new(data);
    let mut units = Vec::new();
    while !r.is_empty() {
        if r.eat(b"#class(") {
            units.push(Unit::Clazz(read_class(&mut r)?));
        } else {
            units.push(Unit::Chunk(read_chunk(&mut r)?));
        }
    }
    Ok(units)
}

fn read_class(r: &mut ByteReader<'_>) -> CoreResult<Clazz> {
    let name = read_field(r, b';')?;
    let super_name = read_field(r, b')')?;
    let mut clazz = Clazz::new(name, super_name);
    loop {
        if r.eat(b"#endclass") {
            return Ok(clazz);
        }
        if r.eat(b"#prop(") {
            let flag = read_field(r, b';')?;
            let constant = flag
                .parse::<bool>()
                .map_err(|_| CoreError::corrupted(format!("invalid const flag `{flag}`")))?;
            let name = read_field(r, b';')?;
            let type_name = read_field(r, b')')?;
            clazz.properties.push(Property { constant, name, type_name });
            continue;
        }
        let chunk = read_chunk(r)?;
        match chunk.kind {
            ChunkKind::Constructor => clazz.constructors.push(chunk),
            ChunkKind::Function => clazz.methods.push(chunk),
            ChunkKind::Main => return Err(CoreError::corrupted("entry point inside a class")),
        }
    }
}

fn read_chunk(r: &mut ByteReader<'_>) -> CoreResult<Chunk> {
    let mut chunk = if r.eat(b"#main(") {
        Chunk::main()
    } else if r.eat(b"#ctor(") {
        Chunk::constructor()
    } else if r.eat(b"#func(") {
        Chunk::function(read_field(r, b';')?)
    } else {
        return Err(CoreError::corrupted(format!("expected a unit header at {}", r.offset())));
    };

    chunk.params = split_plain(&read_field(r, b';')?);
    for name in split_plain(&read_field(r, b';')?) {
        chunk.names.add(&name).map_err(overflow)?;
    }
    for target in split_plain(&read_field(r, b';')?) {
        let target = target
            .parse::<u16>()
            .map_err(|_| CoreError::corrupted(format!("invalid jump target `{target}`")))?;
        chunk.jumps.push_target(target).map_err(overflow)?;
    }
    for raw in split_quoted(&read_field(r, b';')?) {
        chunk.constants.add(parse_constant(&raw)?).map_err(overflow)?;
    }
    let len_field = read_field(r, b')')?;
    let len = len_field
        .parse::<usize>()
        .map_err(|_| CoreError::corrupted(format!("invalid code length `{len_field}`")))?;

    let mut code = ByteReader::new(r.read_bytes(len)?);
    while !code.is_empty() {
        chunk.code.push(Instruction::decode(&mut code)?);
    }
    Ok(chunk)
}

#[allow(clippy::needless_pass_by_value)]
fn overflow(e: super::ChunkError) -> CoreError { CoreError::corrupted(e.to_string()) }

/// Reads up to (and consumes) `stop`, ignoring it inside double quotes.
fn read_field(r: &mut ByteReader<'_>, stop: u8) -> CoreResult<String> {
    let start = r.offset();
    let mut bytes = Vec::new();
    let mut quoted = false;
    loop {
        let b = r.read_u8()?;
        match b {
            b'\\' if quoted => {
                bytes.push(b);
                bytes.push(r.read_u8()?);
            }
            b'"' => {
                quoted = !quoted;
                bytes.push(b);
            }
            _ if b == stop && !quoted => break,
            _ => bytes.push(b),
        }
    }
    String::from_utf8(bytes).map_err(|_| CoreError::InvalidUtf8 { at: start as u64 })
}

fn split_plain(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split(',').map(str::to_owned).collect()
}

fn split_quoted(field: &str) -> Vec<String> {
    let mut out = Vec::new();
    if field.is_empty() {
        return out;
    }
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                cur.push(c);
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                cur.push(c);
            }
            ',' if !quoted => out.push(core::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

fn parse_constant(raw: &str) -> CoreResult<Constant> {
    if let Some(body) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(esc @ ('"' | '\\')) => out.push(esc),
                    _ => return Err(CoreError::corrupted(format!("invalid escape in `{raw}`"))),
                }
            } else {
                out.push(c);
            }
        }
        return Ok(Constant::Str(out));
    }
    raw.parse::<i32>()
        .map(Constant::Int)
        .map_err(|_| CoreError::corrupted(format!("invalid constant `{raw}`")))
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::encode_units;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_class_with_quoted_constants() -> Result<(), Box<dyn std::error::Error>> {
        let mut ctor = Chunk::constructor();
        ctor.params.push("spool.core.String".into());
        let idx = ctor.constants.add(Constant::Str("a,b;c)\"".into()))?;
        ctor.code.push(Instruction::Get { index: idx, constant: true });
        ctor.code.push(Instruction::ExitBlock { count: 1 });
        let mut clazz = Clazz::new("Greeter", "spool.core.Object");
        clazz.properties.push(Property { constant: false, name: "text".into(), type_name: "spool.core.String".into() });
        clazz.constructors.push(ctor);

        let units = vec![Unit::Clazz(clazz), Unit::Chunk(Chunk::main())];
        let bytes = encode_units(&units)?;
        assert_eq!(read_units(&bytes)?, units);
        Ok(())
    }

    #[test]
    fn truncated_code_is_eof() {
        let err = read_units(b"#main(;;;;4)\x04\x00").unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedEof { .. }));
    }

    #[test]
    fn garbage_header_is_rejected() {
        assert!(matches!(read_units(b"#nope("), Err(CoreError::Corrupted(_))));
    }
}
