//! End-to-end assertions on emitted assembly text for the six scenarios
//! this compiler is expected to handle correctly. These check structural
//! properties (presence of instructions, labels, stack-alignment) rather
//! than byte-exact text, since register-allocation offsets and generated
//! label numbers are an implementation detail.

fn compile(source: &str) -> String {
    ccomp::compile_to_assembly(source).unwrap_or_else(|e| panic!("compilation failed: {e}"))
}

fn stack_allocations_are_16_byte_aligned(asm: &str) {
    for line in asm.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("subq\t$") {
            let amount: i64 = rest.split(',').next().unwrap().parse().unwrap();
            assert_eq!(amount % 16, 0, "stack allocation {amount} is not 16-byte aligned in:\n{asm}");
        }
    }
}

#[test]
fn returns_a_constant() {
    let asm = compile("int main(void) { return 2; }");
    assert!(asm.contains("main:"));
    assert!(asm.contains("movl\t$2, %eax") || asm.contains("movl\t$2,%eax"));
    assert!(asm.contains("ret"));
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn complement_of_negation() {
    let asm = compile("int main(void) { return ~(-3); }");
    assert!(asm.contains("negl") || asm.contains("neg"));
    assert!(asm.contains("notl") || asm.contains("not"));
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn arithmetic_precedence() {
    let asm = compile("int main(void) { return (1 + 2) * 3 - 4 / 2; }");
    assert!(asm.contains("imul"));
    assert!(asm.contains("idiv"));
    assert!(asm.contains("cltd"));
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn short_circuit_and_or() {
    let asm = compile("int main(void) { return 1 && (0 || 2); }");
    // short-circuiting needs at least four distinct generated labels
    // (and_false/and_end, or_true/or_end)
    let label_count = asm.lines().filter(|l| l.trim_start().starts_with(".L") && l.trim_end().ends_with(':')).count();
    assert!(label_count >= 4, "expected at least 4 labels for short-circuit lowering, got {label_count}\n{asm}");
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn for_loop_with_break_and_continue_labels() {
    let asm = compile(
        "int main(void) { int x = 0; for (int i = 0; i < 5; i = i + 1) { x = x + i; } return x; }",
    );
    assert!(asm.contains("cmpl"));
    assert!(asm.contains("jl") || asm.contains("jge"));
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn seventh_argument_passed_on_the_stack() {
    let asm = compile(
        "long f(long a, long b, long c, long d, long e, long g, long h) { return h; } \
         int main(void) { return (int) f(1,2,3,4,5,6,42); }",
    );
    assert!(asm.contains("f:"));
    assert!(asm.contains("call\tf\n"));
    // f is defined in the same translation unit, so its call must not carry @PLT
    assert!(!asm.contains("call\tf@PLT"));
    assert!(asm.contains("pushq"), "7th argument should be pushed onto the stack:\n{asm}");
    stack_allocations_are_16_byte_aligned(&asm);
}

#[test]
fn calling_an_undefined_external_function_uses_plt() {
    let asm = compile("int puts(long s); int main(void) { return puts(0); }");
    assert!(asm.contains("call\tputs@PLT"));
}

#[test]
fn unsigned_comparison_uses_unsigned_condition_codes() {
    let asm = compile("int main(void) { unsigned int a = 1; unsigned int b = 2; return a < b; }");
    assert!(asm.contains("setb") || asm.contains("cmpl"));
}
