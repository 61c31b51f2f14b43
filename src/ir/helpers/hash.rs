//! Hash functions for the Map and Set bodies.

pub const SOURCE: &str = r#"
static unsigned long __btrc_hash_int(long v) {
    unsigned long h = (unsigned long)v;
    h ^= h >> 33;
    h *= 0xff51afd7ed558ccdUL;
    h ^= h >> 33;
    return h;
}

static unsigned long __btrc_hash_str(const char* s) {
    unsigned long h = 5381;
    if (!s) return 0;
    while (*s) {
        h = ((h << 5) + h) + (unsigned long)(unsigned char)*s++;
    }
    return h;
}

static int __btrc_eq_str(const char* a, const char* b) {
    if (a == b) return 1;
    if (!a || !b) return 0;
    return strcmp(a, b) == 0;
}
"#;
