#[test]
fn isolation_is_enforced_at_compile_time() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/compile_fail/non_send_arg.rs");
}
