//! Safe allocation wrappers.

pub const SOURCE: &str = r#"
static void* __btrc_alloc(size_t n) {
    void* p = calloc(1, n ? n : 1);
    if (!p) {
        fprintf(stderr, "btrc: out of memory (%zu bytes)\n", n);
        exit(1);
    }
    return p;
}

static void* __btrc_realloc(void* p, size_t n) {
    void* q = realloc(p, n ? n : 1);
    if (!q) {
        fprintf(stderr, "btrc: out of memory (%zu bytes)\n", n);
        exit(1);
    }
    return q;
}
"#;
