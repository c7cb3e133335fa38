//! Pipeline complet : source → unités → octets.

use pretty_assertions::assert_eq;
use spool_compiler::{compile_source, compile_to_bytes, BindingError, CodegenError, CompileError, SemanticError, TypeError};
use spool_core::bytecode::{read_units, ChunkKind, Instruction, Unit};

fn main_chunk(units: &[Unit]) -> &spool_core::bytecode::Chunk {
    units
        .iter()
        .find_map(|u| match u {
            Unit::Chunk(c) if c.kind == ChunkKind::Main => Some(c),
            _ => None,
        })
        .expect("main chunk")
}

#[test]
fn main_with_one_local_encodes_exactly() {
    let bytes = compile_to_bytes("main { var x: spool.core.number.Int32 = 1 }").unwrap();
    let mut expected = b"#main(;x;;1;9)".to_vec();
    expected.extend_from_slice(&[4, 0, 0, 1, 2, 1, 28, 1, 0]);
    assert_eq!(bytes, expected);

    let units = read_units(&bytes).unwrap();
    assert_eq!(units, compile_source("main { var x: spool.core.number.Int32 = 1 }").unwrap());
}

#[test]
fn if_else_jumps_land_on_branch_starts() {
    let units = compile_source(
        "main {
             var x: Int32 = 0
             if (x == 0) { x = 1 } else { x = 2 }
             x = 3
         }",
    )
    .unwrap();
    let main = main_chunk(&units);
    let code = &main.code;

    let Some(Instruction::Jump { point: cond_point, conditional: true }) =
        code.iter().find(|i| matches!(i, Instruction::Jump { conditional: true, .. })).copied()
    else {
        panic!("no conditional jump in {code:?}");
    };
    let skip_at = code.iter().position(|i| matches!(i, Instruction::Jump { conditional: false, .. })).unwrap();
    let Instruction::Jump { point: end_point, .. } = code[skip_at] else { unreachable!() };

    // La condition fausse saute juste après le saut inconditionnel.
    assert_eq!(main.jumps.target(cond_point), Some(u16::try_from(skip_at + 1).unwrap()));
    // Le saut inconditionnel atterrit après la branche `else` et son EXIT_BLOCK.
    let end = usize::from(main.jumps.target(end_point).unwrap());
    assert!(matches!(code[end - 1], Instruction::ExitBlock { .. }));
    assert_eq!(code[end], Instruction::Get { index: 3, constant: true });
}

#[test]
fn undeclared_identifier_is_a_binding_error() {
    let err = compile_source("main { var x: Int32 = y }").unwrap_err();
    let CompileError::Semantic(errors) = err else { panic!("{err:?}") };
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], SemanticError::Binding(BindingError::UndeclaredVariable { name, .. }) if name == "y"));
}

#[test]
fn subtypes_are_accepted_as_arguments_only() {
    let src = "class Animal { }
               class Dog : Animal { }
               class Shelter {
                   func admit(a: Animal) -> Boolean { return true }
               }
               main {
                   var ok: Boolean = new Shelter().admit(new Dog())
               }";
    compile_source(src).unwrap();

    // Pas de conversion implicite à l’initialisation d’une variable.
    let err = compile_source("class Animal { } class Dog : Animal { } main { var a: Animal = new Dog() }")
        .unwrap_err();
    let CompileError::Semantic(errors) = err else { panic!("{err:?}") };
    assert!(matches!(errors[0], SemanticError::Type(TypeError::Mismatch { .. })));
}

#[test]
fn class_header_and_method_chunk() {
    let bytes = compile_to_bytes(
        "class Greeter {
             func greet(name: String) -> String { return \"hi \" + name }
         }",
    )
    .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("#class(Greeter;spool.core.Object)#ctor(;self;;;3)"));
    assert!(text.contains("#func(greet;spool.core.String;self,name;;\"hi \";"));
    assert!(text.ends_with("#endclass"));
}

#[test]
fn break_outside_a_loop_fails_codegen() {
    let err = compile_source("main { break }").unwrap_err();
    assert!(matches!(err, CompileError::Codegen(CodegenError::JumpOutsideLoop { kind: "break", .. })));
}

#[test]
fn native_classes_emit_nothing() {
    let units = compile_source(
        "native class Clock { }
         main { new Console().println(\"tick\") }",
    )
    .unwrap();
    assert_eq!(units.len(), 1);
    assert!(matches!(units[0], Unit::Chunk(_)));
}

#[test]
fn counting_loop_runs_through_every_stage() {
    let src = "class Counter {
                   var total: Int32 = 0
                   func add(n: Int32) { self.total += n }
               }
               main {
                   var c: Counter = new Counter()
                   var i: Int32 = 0
                   loop {
                       if (i >= 10) { break }
                       c.add(i)
                       i += 1
                   }
               }";
    let bytes = compile_to_bytes(src).unwrap();
    let units = read_units(&bytes).unwrap();
    assert_eq!(units.len(), 2);
    assert!(matches!(&units[0], Unit::Clazz(c) if c.name == "Counter" && c.methods.len() == 1));
}
