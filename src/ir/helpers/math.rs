//! Checked integer division.

pub const SOURCE: &str = r#"
static long __btrc_div_int(long a, long b) {
    if (b == 0) {
        fprintf(stderr, "btrc: division by zero\n");
        exit(1);
    }
    return a / b;
}

static long __btrc_mod_int(long a, long b) {
    if (b == 0) {
        fprintf(stderr, "btrc: modulo by zero\n");
        exit(1);
    }
    return a % b;
}
"#;
