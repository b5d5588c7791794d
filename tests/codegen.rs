//! Assembly-text properties of the x86-64 backend, checked through the
//! library pipeline without invoking an assembler.

use lcc::driver::compile_to_assembly;
use lcc::target::Target;

fn asm(source: &str) -> String {
    compile_to_assembly(source, Target::X86_64).expect("expected the program to compile")
}

#[test]
fn hello_world_shape() {
    let text = asm(r#"run { @print["Hello"]; };"#);
    assert!(text.contains("_start:"));
    assert!(text.contains(".global _start"));
    assert!(text.contains(".asciz \"Hello\""));
    assert!(text.contains("call print_string"));
    // run blocks end in sys_exit(0), not ret
    assert!(text.contains("movq $60, %rax"));
    assert!(text.contains("syscall"));
}

#[test]
fn folded_constant_lowers_to_an_immediate() {
    let text = asm("run { val num X = 2 + 3 * 4; @print[X]; };");
    assert!(text.contains("movq $14, %rax"), "constant was not folded:\n{}", text);
    // the constant owns no stack slot, so the frame stays empty
    assert!(!text.contains("subq $"), "unexpected frame allocation:\n{}", text);
    assert!(!text.contains("(%rbp)"), "unexpected stack traffic:\n{}", text);
}

#[test]
fn functions_get_frames_and_the_callers_pass_registers() {
    let text = asm(
        "fnc add[num a, num b]:num { return a + b; } run { num r = @add[5, 3]; @print[r]; };",
    );
    assert!(text.contains("fn_add:"));
    assert!(text.contains("call fn_add"));
    // prologue/epilogue pair
    assert!(text.contains("pushq %rbp"));
    assert!(text.contains("movq %rsp, %rbp"));
    assert!(text.contains("popq %rbp"));
    assert!(text.contains("ret"));
    // parameters land in their stack slots from the argument registers
    assert!(text.contains("movq %rdi, -8(%rbp)"));
    assert!(text.contains("movq %rsi, -16(%rbp)"));
}

#[test]
fn division_uses_cqto_idivq() {
    let text = asm("run { num a = 7; num b = a / 2; @print[b]; };");
    assert!(text.contains("cqto"));
    assert!(text.contains("idivq"));
}

#[test]
fn comparisons_use_set_and_zero_extend() {
    let text = asm("run { num a = 1; bool b = a < 2; };");
    assert!(text.contains("setl %al"));
    assert!(text.contains("movzbq %al, %rax"));
}

#[test]
fn repeat_dispatch_compares_against_the_selector() {
    let text = asm(
        r#"run { num d = 3; repeat [d] { when [1] { @print["one"]; } when [3] { @print["three"]; } fixed { @print["other"]; } } };"#,
    );
    assert!(text.contains(".Lcase"));
    assert!(text.contains(".Lfixed"));
    assert!(text.contains(".asciz \"three\""));
    // each case body breaks straight to the end label
    let je_count = text.matches("je .Lcase").count();
    assert_eq!(je_count, 2, "one compare-branch per when case:\n{}", text);
}

#[test]
fn if_or_else_chain_is_fully_lowered() {
    let text = asm(
        r#"run { num a = 2; if [a == 1] { @print["one"]; } or [a == 2] { @print["two"]; } else { @print["many"]; } };"#,
    );
    assert!(text.contains(".asciz \"one\""));
    assert!(text.contains(".asciz \"two\""));
    assert!(text.contains(".asciz \"many\""));
    assert!(text.matches("je .Lnext").count() >= 2, "both arms need guards:\n{}", text);
}

#[test]
fn literals_are_interned_once() {
    let text = asm(r#"run { @print["dup"]; @print["dup"]; @print["dup"]; };"#);
    assert_eq!(text.matches(".asciz \"dup\"").count(), 1);
}

#[test]
fn runtime_is_gated_by_use() {
    let text = asm(r#"run { @print["x"]; };"#);
    assert!(text.contains("print_string:"));
    assert!(text.contains("strlen:"));
    assert!(!text.contains("string_concat:"));
    assert!(!text.contains("read_string:"));
    assert!(!text.contains("string_interpolate:"));

    let text = asm(r#"run { text a = "f"; text b = "b"; @print[a +>> b]; };"#);
    assert!(text.contains("string_concat:"));
    assert!(text.contains("memcpy_simple:"));
}

#[test]
fn scratch_buffers_are_reserved_in_data() {
    let text = asm(r#"run { };"#);
    assert!(text.contains("input_buffer:"));
    assert!(text.contains(".space 256"));
    assert!(text.contains("temp_buffer:"));
    assert!(text.contains(".space 64"));
    assert!(text.contains("string_buffer:"));
    assert!(text.contains(".space 4096"));
    // the aliasing contract is documented in the emitted text
    assert!(text.contains("arena"));
}

#[test]
fn read_builtins_route_through_converters() {
    let text = asm(r#"run { num n = @num.read[""]; @print[n]; };"#);
    assert!(text.contains("call read_string"));
    assert!(text.contains("call string_to_num"));
    assert!(text.contains("string_to_num:"));

    let text = asm(r#"run { bool b = @bool.read["? "]; };"#);
    assert!(text.contains("call string_to_bool"));
    assert!(text.contains(".asciz \"true\""));
    assert!(text.contains(".asciz \"false\""));
}

#[test]
fn print_dispatch_is_static() {
    let text = asm("run { @print[42]; };");
    assert!(text.contains("call num_to_string"));
    let text = asm("run { @print['x']; };");
    assert!(text.contains("call char_to_string"));
    let text = asm("run { @print[true]; };");
    assert!(text.contains("call bool_to_string"));
    let text = asm(r#"run { @print["s"]; };"#);
    assert!(!text.contains("to_string"));
}

#[test]
fn interpolation_pushes_counts_parts_and_pairs() {
    let text = asm(r#"run { num x = 7; @print["x is ${x:d}!"]; };"#);
    assert!(text.contains("call string_interpolate"));
    assert!(text.contains(".asciz \"x is \""));
    assert!(text.contains(".asciz \"!\""));
    assert!(text.contains(".asciz \":d\""));
    // one expression, two static parts
    assert!(text.contains("pushq $2"));
    assert!(text.contains("pushq $1"));
}

#[test]
fn try_lowers_to_try_then_finally() {
    let text = asm(
        r#"run { try { @print["t"]; } catch[e] { @print["c"]; } finally { @print["f"]; } };"#,
    );
    assert!(text.contains(".asciz \"t\""));
    assert!(text.contains(".asciz \"f\""));
    // the catch body is never emitted
    assert!(!text.contains(".asciz \"c\""));
}

#[test]
fn struct_members_use_field_offsets() {
    let text = asm(
        "struct Point { num x; num y; } ; run { Point p = Point { x = 1, y = 2 }; num z = p->y; @print[z]; };",
    );
    // second field sits one slot above the region base
    assert!(text.contains("movq 8("), "field load should use offset 8:\n{}", text);
}

#[test]
fn stub_backends_emit_their_conventions() -> anyhow::Result<()> {
    let source = r#"run { @print["hi"]; };"#;
    let arm64 = compile_to_assembly(source, Target::Aarch64)?;
    assert!(arm64.contains("mov x8, #64"));
    assert!(arm64.contains("mov x8, #93"));
    let arm32 = compile_to_assembly(source, Target::Arm32)?;
    assert!(arm32.contains("mov r7, #4"));
    assert!(arm32.contains("mov r7, #1"));

    // anything beyond literal printing is a structured refusal
    let err = compile_to_assembly("run { num x = 1; };", Target::Aarch64).unwrap_err();
    assert!(err.to_string().starts_with("codegen error:"));
    Ok(())
}
