//! The support routines linked into every emitted program, written as typed
//! assembly. Only the routines a program actually references are emitted;
//! the `Runtime` set records references and [`expand`] closes it over the
//! call graph below.
//!
//! Register contracts (custom, not the C ABI):
//!   print_string               rdi = string
//!   read_string                -> rax = input_buffer
//!   remove_newline             rdi = string
//!   strlen                     rdi = string -> rax = length (rdi preserved)
//!   string_to_num              rdi = string -> rax
//!   string_to_char             rdi = string -> rax
//!   string_to_bool             rdi = string -> rax
//!   num_to_string              rdi = value -> rax = into temp_buffer
//!   char_to_string             rdi = value -> rax = temp_buffer
//!   bool_to_string             rdi = value -> rax = interned literal
//!   string_concat              rdi = lhs, rsi = rhs -> rax = string_buffer
//!   string_append              rdi = string, appended to string_buffer
//!   value_to_string_formatted  rdi = value, rsi = format -> rax = string
//!   memcpy_simple              rdi = dst, rsi = src, rcx = count
//!   string_interpolate         stack protocol, see below

use super::{idx, imm, mem, r, sym, sym_idx, sym_mem};
use crate::codegen::assembly::Condition::*;
use crate::codegen::assembly::{Asm, Instruction::*, Register::*};
use crate::codegen::LiteralPool;
use bitflags::bitflags;

bitflags! {
    pub struct Runtime: u16 {
        const PRINT_STRING              = 1 << 0;
        const READ_STRING               = 1 << 1;
        const REMOVE_NEWLINE            = 1 << 2;
        const STRLEN                    = 1 << 3;
        const STRING_TO_NUM             = 1 << 4;
        const STRING_TO_CHAR            = 1 << 5;
        const STRING_TO_BOOL            = 1 << 6;
        const NUM_TO_STRING             = 1 << 7;
        const CHAR_TO_STRING            = 1 << 8;
        const BOOL_TO_STRING            = 1 << 9;
        const STRING_CONCAT             = 1 << 10;
        const STRING_APPEND             = 1 << 11;
        const STRING_INTERPOLATE        = 1 << 12;
        const VALUE_TO_STRING_FORMATTED = 1 << 13;
        const MEMCPY_SIMPLE             = 1 << 14;
    }
}

/// Close a reference set over the routines the routines themselves call.
pub fn expand(mut set: Runtime) -> Runtime {
    loop {
        let mut grown = set;
        if set.contains(Runtime::PRINT_STRING) {
            grown |= Runtime::STRLEN;
        }
        if set.contains(Runtime::READ_STRING) {
            grown |= Runtime::REMOVE_NEWLINE;
        }
        if set.intersects(Runtime::STRING_CONCAT | Runtime::STRING_APPEND) {
            grown |= Runtime::STRLEN | Runtime::MEMCPY_SIMPLE;
        }
        if set.contains(Runtime::STRING_INTERPOLATE) {
            grown |= Runtime::STRING_APPEND | Runtime::VALUE_TO_STRING_FORMATTED;
        }
        if set.contains(Runtime::VALUE_TO_STRING_FORMATTED) {
            grown |= Runtime::NUM_TO_STRING
                | Runtime::CHAR_TO_STRING
                | Runtime::BOOL_TO_STRING;
        }
        if grown == set {
            return set;
        }
        set = grown;
    }
}

/// Emit the routines in `set` (already expanded), interning any literals
/// they reference.
pub fn emit(set: Runtime, pool: &mut LiteralPool) -> Vec<Asm> {
    let mut out = Vec::new();
    if set.contains(Runtime::PRINT_STRING) {
        print_string(&mut out);
    }
    if set.contains(Runtime::READ_STRING) {
        read_string(&mut out);
    }
    if set.contains(Runtime::REMOVE_NEWLINE) {
        remove_newline(&mut out);
    }
    if set.contains(Runtime::STRLEN) {
        strlen(&mut out);
    }
    if set.contains(Runtime::STRING_TO_NUM) {
        string_to_num(&mut out);
    }
    if set.contains(Runtime::STRING_TO_CHAR) {
        string_to_char(&mut out);
    }
    if set.contains(Runtime::STRING_TO_BOOL) {
        string_to_bool(&mut out, pool);
    }
    if set.contains(Runtime::NUM_TO_STRING) {
        num_to_string(&mut out);
    }
    if set.contains(Runtime::CHAR_TO_STRING) {
        char_to_string(&mut out);
    }
    if set.contains(Runtime::BOOL_TO_STRING) {
        bool_to_string(&mut out, pool);
    }
    if set.contains(Runtime::STRING_CONCAT) {
        string_concat(&mut out);
    }
    if set.contains(Runtime::STRING_APPEND) {
        string_append(&mut out);
    }
    if set.contains(Runtime::STRING_INTERPOLATE) {
        string_interpolate(&mut out);
    }
    if set.contains(Runtime::VALUE_TO_STRING_FORMATTED) {
        value_to_string_formatted(&mut out);
    }
    if set.contains(Runtime::MEMCPY_SIMPLE) {
        memcpy_simple(&mut out);
    }
    out
}

fn label(out: &mut Vec<Asm>, name: &str) {
    out.push(Asm::Label(name.to_string()));
}

fn comment(out: &mut Vec<Asm>, text: &str) {
    out.push(Asm::Comment(text.to_string()));
}

/// write(1, string, strlen(string))
fn print_string(out: &mut Vec<Asm>) {
    comment(out, "print_string: write the NUL-terminated string in rdi to stdout");
    label(out, "print_string");
    out.extend([
        Pushq(r(Rdi)).into(),
        Call("strlen".into()).into(),
        Popq(r(Rsi)).into(),
        Movq { src: r(Rax), dst: r(Rdx) }.into(),
        Movq { src: imm(1), dst: r(Rax) }.into(),
        Movq { src: imm(1), dst: r(Rdi) }.into(),
        Syscall.into(),
        Ret.into(),
    ]);
}

/// read(0, input_buffer, 255), then cut the line feed.
fn read_string(out: &mut Vec<Asm>) {
    comment(out, "read_string: read one line (at most 255 bytes) into input_buffer");
    label(out, "read_string");
    out.extend([
        Xorq { src: r(Rax), dst: r(Rax) }.into(),
        Xorq { src: r(Rdi), dst: r(Rdi) }.into(),
        Movq { src: sym("input_buffer"), dst: r(Rsi) }.into(),
        Movq { src: imm(255), dst: r(Rdx) }.into(),
        Syscall.into(),
        Cmpq { src: imm(0), dst: r(Rax) }.into(),
        J { condition: GreaterEqual, label: ".Lread_ok".into() }.into(),
        Xorq { src: r(Rax), dst: r(Rax) }.into(),
    ]);
    label(out, ".Lread_ok");
    out.extend([
        Movb { src: imm(0), dst: sym_idx("input_buffer", Rax) }.into(),
        Movq { src: sym("input_buffer"), dst: r(Rdi) }.into(),
        Call("remove_newline".into()).into(),
        Movq { src: sym("input_buffer"), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
}

fn remove_newline(out: &mut Vec<Asm>) {
    comment(out, "remove_newline: overwrite the first line feed with a terminator");
    label(out, "remove_newline");
    label(out, ".Lrmnl_next");
    out.extend([
        Movzbq { src: mem(Rdi, 0), dst: Rax }.into(),
        Cmpq { src: imm(0), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lrmnl_done".into() }.into(),
        Cmpq { src: imm(i64::from(b'\n')), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lrmnl_found".into() }.into(),
        Incq(r(Rdi)).into(),
        Jmp(".Lrmnl_next".into()).into(),
    ]);
    label(out, ".Lrmnl_found");
    out.push(Movb { src: imm(0), dst: mem(Rdi, 0) }.into());
    label(out, ".Lrmnl_done");
    out.push(Ret.into());
}

fn strlen(out: &mut Vec<Asm>) {
    comment(out, "strlen: length of the string in rdi, terminator excluded");
    label(out, "strlen");
    out.push(Xorq { src: r(Rax), dst: r(Rax) }.into());
    label(out, ".Lstrlen_next");
    out.extend([
        Cmpb { src: imm(0), dst: idx(Rdi, Rax, 1) }.into(),
        J { condition: Equals, label: ".Lstrlen_done".into() }.into(),
        Incq(r(Rax)).into(),
        Jmp(".Lstrlen_next".into()).into(),
    ]);
    label(out, ".Lstrlen_done");
    out.push(Ret.into());
}

/// Leading spaces/tabs skipped, optional sign, digits until the first
/// non-digit. Empty or invalid input parses to 0; overflow wraps.
fn string_to_num(out: &mut Vec<Asm>) {
    comment(out, "string_to_num: parse a signed decimal from the string in rdi");
    label(out, "string_to_num");
    out.extend([
        Xorq { src: r(Rax), dst: r(Rax) }.into(),
        Xorq { src: r(Rcx), dst: r(Rcx) }.into(),
    ]);
    label(out, ".Lstn_skip");
    out.extend([
        Movzbq { src: mem(Rdi, 0), dst: Rdx }.into(),
        Cmpq { src: imm(i64::from(b' ')), dst: r(Rdx) }.into(),
        J { condition: Equals, label: ".Lstn_skip_one".into() }.into(),
        Cmpq { src: imm(i64::from(b'\t')), dst: r(Rdx) }.into(),
        J { condition: NotEquals, label: ".Lstn_sign".into() }.into(),
    ]);
    label(out, ".Lstn_skip_one");
    out.extend([
        Incq(r(Rdi)).into(),
        Jmp(".Lstn_skip".into()).into(),
    ]);
    label(out, ".Lstn_sign");
    out.extend([
        Cmpq { src: imm(i64::from(b'-')), dst: r(Rdx) }.into(),
        J { condition: NotEquals, label: ".Lstn_plus".into() }.into(),
        Movq { src: imm(1), dst: r(Rcx) }.into(),
        Incq(r(Rdi)).into(),
        Jmp(".Lstn_digits".into()).into(),
    ]);
    label(out, ".Lstn_plus");
    out.extend([
        Cmpq { src: imm(i64::from(b'+')), dst: r(Rdx) }.into(),
        J { condition: NotEquals, label: ".Lstn_digits".into() }.into(),
        Incq(r(Rdi)).into(),
    ]);
    label(out, ".Lstn_digits");
    out.extend([
        Movzbq { src: mem(Rdi, 0), dst: Rdx }.into(),
        Cmpq { src: imm(i64::from(b'0')), dst: r(Rdx) }.into(),
        J { condition: LessThan, label: ".Lstn_done".into() }.into(),
        Cmpq { src: imm(i64::from(b'9')), dst: r(Rdx) }.into(),
        J { condition: GreaterThan, label: ".Lstn_done".into() }.into(),
        Imulq { src: imm(10), dst: Rax }.into(),
        Subq { src: imm(i64::from(b'0')), dst: r(Rdx) }.into(),
        Addq { src: r(Rdx), dst: r(Rax) }.into(),
        Incq(r(Rdi)).into(),
        Jmp(".Lstn_digits".into()).into(),
    ]);
    label(out, ".Lstn_done");
    out.extend([
        Cmpq { src: imm(0), dst: r(Rcx) }.into(),
        J { condition: Equals, label: ".Lstn_ret".into() }.into(),
        Negq(r(Rax)).into(),
    ]);
    label(out, ".Lstn_ret");
    out.push(Ret.into());
}

fn string_to_char(out: &mut Vec<Asm>) {
    comment(out, "string_to_char: first byte of the string in rdi, 0 when empty");
    label(out, "string_to_char");
    out.extend([
        Movzbq { src: mem(Rdi, 0), dst: Rax }.into(),
        Ret.into(),
    ]);
}

/// Exact match against "true" gives 1; everything else, "false" included,
/// gives 0.
fn string_to_bool(out: &mut Vec<Asm>, pool: &mut LiteralPool) {
    let true_label = pool.intern("true");
    pool.intern("false");
    comment(out, "string_to_bool: 1 on an exact \"true\", else 0");
    label(out, "string_to_bool");
    out.push(Movq { src: sym(true_label), dst: r(Rsi) }.into());
    label(out, ".Lstb_next");
    out.extend([
        Movzbq { src: mem(Rdi, 0), dst: Rax }.into(),
        Movzbq { src: mem(Rsi, 0), dst: Rdx }.into(),
        Cmpq { src: r(Rdx), dst: r(Rax) }.into(),
        J { condition: NotEquals, label: ".Lstb_no".into() }.into(),
        Cmpq { src: imm(0), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lstb_yes".into() }.into(),
        Incq(r(Rdi)).into(),
        Incq(r(Rsi)).into(),
        Jmp(".Lstb_next".into()).into(),
    ]);
    label(out, ".Lstb_yes");
    out.extend([
        Movq { src: imm(1), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
    label(out, ".Lstb_no");
    out.extend([
        Xorq { src: r(Rax), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
}

/// Digits are written right to left into the tail of temp_buffer; the
/// returned pointer floats inside the buffer.
fn num_to_string(out: &mut Vec<Asm>) {
    comment(out, "num_to_string: signed decimal image of rdi in temp_buffer");
    label(out, "num_to_string");
    out.extend([
        Movq { src: r(Rdi), dst: r(Rax) }.into(),
        Movq { src: sym("temp_buffer"), dst: r(Rsi) }.into(),
        Addq { src: imm(63), dst: r(Rsi) }.into(),
        Movb { src: imm(0), dst: mem(Rsi, 0) }.into(),
        Xorq { src: r(R9), dst: r(R9) }.into(),
        Cmpq { src: imm(0), dst: r(Rax) }.into(),
        J { condition: GreaterEqual, label: ".Lnts_digits".into() }.into(),
        Movq { src: imm(1), dst: r(R9) }.into(),
        Negq(r(Rax)).into(),
    ]);
    label(out, ".Lnts_digits");
    out.push(Movq { src: imm(10), dst: r(Rcx) }.into());
    label(out, ".Lnts_next");
    out.extend([
        Xorq { src: r(Rdx), dst: r(Rdx) }.into(),
        Idivq(r(Rcx)).into(),
        Addq { src: imm(i64::from(b'0')), dst: r(Rdx) }.into(),
        Decq(r(Rsi)).into(),
        Movb { src: r(Rdx), dst: mem(Rsi, 0) }.into(),
        Cmpq { src: imm(0), dst: r(Rax) }.into(),
        J { condition: NotEquals, label: ".Lnts_next".into() }.into(),
        Cmpq { src: imm(0), dst: r(R9) }.into(),
        J { condition: Equals, label: ".Lnts_done".into() }.into(),
        Decq(r(Rsi)).into(),
        Movb { src: imm(i64::from(b'-')), dst: mem(Rsi, 0) }.into(),
    ]);
    label(out, ".Lnts_done");
    out.extend([
        Movq { src: r(Rsi), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
}

fn char_to_string(out: &mut Vec<Asm>) {
    comment(out, "char_to_string: one byte and a terminator in temp_buffer");
    label(out, "char_to_string");
    out.extend([
        Movq { src: sym("temp_buffer"), dst: r(Rax) }.into(),
        Movb { src: r(Rdi), dst: mem(Rax, 0) }.into(),
        Movb { src: imm(0), dst: mem(Rax, 1) }.into(),
        Ret.into(),
    ]);
}

fn bool_to_string(out: &mut Vec<Asm>, pool: &mut LiteralPool) {
    let true_label = pool.intern("true");
    let false_label = pool.intern("false");
    comment(out, "bool_to_string: the interned \"true\"/\"false\" literal");
    label(out, "bool_to_string");
    out.extend([
        Movq { src: sym(true_label), dst: r(Rax) }.into(),
        Cmpq { src: imm(0), dst: r(Rdi) }.into(),
        J { condition: NotEquals, label: ".Lbts_done".into() }.into(),
        Movq { src: sym(false_label), dst: r(Rax) }.into(),
    ]);
    label(out, ".Lbts_done");
    out.push(Ret.into());
}

/// Copies the left string into the arena head (a no-op when it already is
/// the arena), then the right string after it. Not reentrant.
fn string_concat(out: &mut Vec<Asm>) {
    comment(out, "string_concat: rdi then rsi concatenated into string_buffer");
    label(out, "string_concat");
    out.extend([
        Pushq(r(Rsi)).into(),
        Pushq(r(Rdi)).into(),
        Call("strlen".into()).into(),
        Movq { src: r(Rax), dst: r(Rcx) }.into(),
        Popq(r(Rsi)).into(),
        Movq { src: sym("string_buffer"), dst: r(Rdi) }.into(),
        Call("memcpy_simple".into()).into(),
        Leaq { src: idx(Rdi, Rcx, 1), dst: Rdi }.into(),
        Popq(r(Rsi)).into(),
        Pushq(r(Rdi)).into(),
        Movq { src: r(Rsi), dst: r(Rdi) }.into(),
        Call("strlen".into()).into(),
        Movq { src: r(Rax), dst: r(Rcx) }.into(),
        Movq { src: r(Rdi), dst: r(Rsi) }.into(),
        Popq(r(Rdi)).into(),
        Call("memcpy_simple".into()).into(),
        Movb { src: imm(0), dst: idx(Rdi, Rcx, 1) }.into(),
        Movq { src: sym("string_buffer"), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
}

/// Appends the string in rdi at the arena's current end, keeping the
/// terminator.
fn string_append(out: &mut Vec<Asm>) {
    comment(out, "string_append: append the string in rdi to string_buffer");
    label(out, "string_append");
    out.extend([
        Pushq(r(Rdi)).into(),
        Movq { src: sym("string_buffer"), dst: r(Rdi) }.into(),
        Call("strlen".into()).into(),
        Movq { src: r(Rax), dst: r(R8) }.into(),
        Popq(r(Rdi)).into(),
        Call("strlen".into()).into(),
        Movq { src: r(Rax), dst: r(Rcx) }.into(),
        Movq { src: r(Rdi), dst: r(Rsi) }.into(),
        Leaq { src: sym_idx("string_buffer", R8), dst: Rdi }.into(),
        Call("memcpy_simple".into()).into(),
        Movb { src: imm(0), dst: idx(Rdi, Rcx, 1) }.into(),
        Ret.into(),
    ]);
}

/// Stack protocol, values pushed by the emitter (top first at entry):
///
///   [expr count] [part count] [part 0 .. part K]
///   [value 0] [format 0] .. [value K-1] [format K-1]
///
/// The routine owns its arguments: it resets the arena, alternates
/// string_append(part) with value_to_string_formatted+append, unwinds the
/// argument block and returns the arena address in rax.
fn string_interpolate(out: &mut Vec<Asm>) {
    comment(out, "string_interpolate: build an interpolated string in string_buffer");
    label(out, "string_interpolate");
    out.extend([
        Popq(r(R11)).into(),
        Popq(r(R12)).into(),
        Popq(r(R13)).into(),
        Movq { src: r(Rsp), dst: r(R14) }.into(),
        Leaq { src: idx(Rsp, R13, 8), dst: R15 }.into(),
        Movb { src: imm(0), dst: sym_mem("string_buffer") }.into(),
        Xorq { src: r(Rbx), dst: r(Rbx) }.into(),
    ]);
    label(out, ".Lsi_next");
    out.extend([
        Movq { src: idx(R14, Rbx, 8), dst: r(Rdi) }.into(),
        Call("string_append".into()).into(),
        Cmpq { src: r(R12), dst: r(Rbx) }.into(),
        J { condition: Equals, label: ".Lsi_done".into() }.into(),
        Leaq { src: idx(Rbx, Rbx, 1), dst: Rax }.into(),
        Movq { src: idx(R15, Rax, 8), dst: r(Rdi) }.into(),
        Movq {
            src: crate::codegen::assembly::Operand::Indexed {
                base: R15,
                index: Rax,
                scale: 8,
                offset: 8,
            },
            dst: r(Rsi),
        }
        .into(),
        Call("value_to_string_formatted".into()).into(),
        Movq { src: r(Rax), dst: r(Rdi) }.into(),
        Call("string_append".into()).into(),
        Incq(r(Rbx)).into(),
        Jmp(".Lsi_next".into()).into(),
    ]);
    label(out, ".Lsi_done");
    out.extend([
        Leaq { src: idx(R13, R12, 2), dst: Rax }.into(),
        Leaq { src: idx(Rsp, Rax, 8), dst: Rsp }.into(),
        Movq { src: sym("string_buffer"), dst: r(Rax) }.into(),
        JmpReg(R11).into(),
    ]);
}

/// Dispatch on the format string: `:s` passes the value through as a text
/// pointer, `:c` and `:b` route through the char/bool converters, `:d`,
/// `:f` and anything else (the empty format included) are numeric.
fn value_to_string_formatted(out: &mut Vec<Asm>) {
    comment(out, "value_to_string_formatted: convert rdi according to the format in rsi");
    label(out, "value_to_string_formatted");
    out.extend([
        Cmpb { src: imm(0), dst: mem(Rsi, 0) }.into(),
        J { condition: Equals, label: ".Lvtsf_num".into() }.into(),
        Movzbq { src: mem(Rsi, 1), dst: Rax }.into(),
        Cmpq { src: imm(i64::from(b's')), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lvtsf_str".into() }.into(),
        Cmpq { src: imm(i64::from(b'c')), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lvtsf_char".into() }.into(),
        Cmpq { src: imm(i64::from(b'b')), dst: r(Rax) }.into(),
        J { condition: Equals, label: ".Lvtsf_bool".into() }.into(),
    ]);
    label(out, ".Lvtsf_num");
    out.extend([
        Call("num_to_string".into()).into(),
        Ret.into(),
    ]);
    label(out, ".Lvtsf_str");
    out.extend([
        Movq { src: r(Rdi), dst: r(Rax) }.into(),
        Ret.into(),
    ]);
    label(out, ".Lvtsf_char");
    out.extend([
        Call("char_to_string".into()).into(),
        Ret.into(),
    ]);
    label(out, ".Lvtsf_bool");
    out.extend([
        Call("bool_to_string".into()).into(),
        Ret.into(),
    ]);
}

/// Byte-for-byte forward copy; preserves rdi, rsi and rcx.
fn memcpy_simple(out: &mut Vec<Asm>) {
    comment(out, "memcpy_simple: copy rcx bytes from rsi to rdi");
    label(out, "memcpy_simple");
    out.push(Xorq { src: r(Rdx), dst: r(Rdx) }.into());
    label(out, ".Lmemcpy_next");
    out.extend([
        Cmpq { src: r(Rcx), dst: r(Rdx) }.into(),
        J { condition: Equals, label: ".Lmemcpy_done".into() }.into(),
        Movb { src: idx(Rsi, Rdx, 1), dst: r(Rax) }.into(),
        Movb { src: r(Rax), dst: idx(Rdi, Rdx, 1) }.into(),
        Incq(r(Rdx)).into(),
        Jmp(".Lmemcpy_next".into()).into(),
    ]);
    label(out, ".Lmemcpy_done");
    out.push(Ret.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_reaches_fixpoint() {
        let set = expand(Runtime::STRING_INTERPOLATE);
        assert!(set.contains(Runtime::STRING_APPEND));
        assert!(set.contains(Runtime::MEMCPY_SIMPLE));
        assert!(set.contains(Runtime::STRLEN));
        assert!(set.contains(Runtime::NUM_TO_STRING));
        assert!(set.contains(Runtime::BOOL_TO_STRING));
        assert!(!set.contains(Runtime::READ_STRING));
    }

    #[test]
    fn print_needs_strlen_only() {
        let set = expand(Runtime::PRINT_STRING);
        assert_eq!(set, Runtime::PRINT_STRING | Runtime::STRLEN);
    }

    #[test]
    fn emitted_routines_are_gated() {
        let mut pool = LiteralPool::new();
        let text = emit(expand(Runtime::PRINT_STRING), &mut pool)
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("print_string:"));
        assert!(text.contains("strlen:"));
        assert!(!text.contains("string_concat:"));
        assert!(!text.contains("read_string:"));
    }

    #[test]
    fn bool_conversion_interns_both_literals() {
        let mut pool = LiteralPool::new();
        emit(Runtime::BOOL_TO_STRING, &mut pool);
        assert_eq!(pool.entries().count(), 2);
        let contents: Vec<_> = pool.entries().map(|(_, c)| c.to_string()).collect();
        assert!(contents.contains(&"true".to_string()));
        assert!(contents.contains(&"false".to_string()));
    }
}
