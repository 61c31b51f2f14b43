//! String runtime: the tracking pool plus the query / convert / transform
//! helper families.

/// Every string the runtime allocates is registered here and freed at
/// process exit, so generated code never frees intermediate strings.
pub const POOL: &str = r#"
static char** __btrc_str_pool = NULL;
static int __btrc_str_pool_len = 0;
static int __btrc_str_pool_cap = 0;

static void __btrc_str_pool_free(void) {
    int i;
    for (i = 0; i < __btrc_str_pool_len; i++) {
        free(__btrc_str_pool[i]);
    }
    free(__btrc_str_pool);
    __btrc_str_pool = NULL;
    __btrc_str_pool_len = 0;
    __btrc_str_pool_cap = 0;
}

static char* __btrc_str_track(char* s) {
    if (!s) return s;
    if (__btrc_str_pool_len == __btrc_str_pool_cap) {
        if (__btrc_str_pool_cap == 0) {
            __btrc_str_pool_cap = 64;
            atexit(__btrc_str_pool_free);
        } else {
            __btrc_str_pool_cap *= 2;
        }
        __btrc_str_pool = (char**)__btrc_realloc(
            __btrc_str_pool, sizeof(char*) * (size_t)__btrc_str_pool_cap);
    }
    __btrc_str_pool[__btrc_str_pool_len++] = s;
    return s;
}
"#;

pub const QUERY: &str = r#"
static int __btrc_str_len(const char* s) {
    return s ? (int)strlen(s) : 0;
}

static int __btrc_str_indexof(const char* s, const char* needle) {
    const char* at;
    if (!s || !needle) return -1;
    at = strstr(s, needle);
    return at ? (int)(at - s) : -1;
}

static int __btrc_str_contains(const char* s, const char* needle) {
    return s && needle && strstr(s, needle) != NULL;
}

static int __btrc_str_startswith(const char* s, const char* prefix) {
    if (!s || !prefix) return 0;
    return strncmp(s, prefix, strlen(prefix)) == 0;
}

static int __btrc_str_endswith(const char* s, const char* suffix) {
    size_t n, m;
    if (!s || !suffix) return 0;
    n = strlen(s);
    m = strlen(suffix);
    if (m > n) return 0;
    return strcmp(s + (n - m), suffix) == 0;
}
"#;

pub const CONVERT: &str = r#"
static long __btrc_str_toint(const char* s) {
    return s ? strtol(s, NULL, 10) : 0;
}

static double __btrc_str_tofloat(const char* s) {
    return s ? strtod(s, NULL) : 0.0;
}

static char* __btrc_int_tostr(long v) {
    char buf[32];
    int n = snprintf(buf, sizeof buf, "%ld", v);
    char* out = (char*)__btrc_alloc((size_t)n + 1);
    memcpy(out, buf, (size_t)n + 1);
    return __btrc_str_track(out);
}

static char* __btrc_float_tostr(double v) {
    char buf[64];
    int n = snprintf(buf, sizeof buf, "%g", v);
    char* out = (char*)__btrc_alloc((size_t)n + 1);
    memcpy(out, buf, (size_t)n + 1);
    return __btrc_str_track(out);
}
"#;

pub const TRANSFORM: &str = r#"
static char* __btrc_str_dup(const char* s) {
    size_t n;
    char* out;
    if (!s) s = "";
    n = strlen(s);
    out = (char*)__btrc_alloc(n + 1);
    memcpy(out, s, n + 1);
    return __btrc_str_track(out);
}

static char* __btrc_str_concat(const char* a, const char* b) {
    size_t na, nb;
    char* out;
    if (!a) a = "";
    if (!b) b = "";
    na = strlen(a);
    nb = strlen(b);
    out = (char*)__btrc_alloc(na + nb + 1);
    memcpy(out, a, na);
    memcpy(out + na, b, nb + 1);
    return __btrc_str_track(out);
}

static char* __btrc_str_substring(const char* s, int start, int end) {
    int n;
    char* out;
    if (!s) s = "";
    n = (int)strlen(s);
    if (start < 0) start = 0;
    if (end > n) end = n;
    if (start > end) start = end;
    out = (char*)__btrc_alloc((size_t)(end - start) + 1);
    memcpy(out, s + start, (size_t)(end - start));
    out[end - start] = '\0';
    return __btrc_str_track(out);
}

static char* __btrc_str_trim(const char* s) {
    size_t start, end;
    if (!s) s = "";
    start = 0;
    end = strlen(s);
    while (start < end && isspace((unsigned char)s[start])) start++;
    while (end > start && isspace((unsigned char)s[end - 1])) end--;
    return __btrc_str_substring(s, (int)start, (int)end);
}

static char* __btrc_str_toupper(const char* s) {
    char* out = __btrc_str_dup(s);
    char* p;
    for (p = out; *p; p++) *p = (char)toupper((unsigned char)*p);
    return out;
}

static char* __btrc_str_tolower(const char* s) {
    char* out = __btrc_str_dup(s);
    char* p;
    for (p = out; *p; p++) *p = (char)tolower((unsigned char)*p);
    return out;
}

static char* __btrc_str_replace(const char* s, const char* from, const char* to) {
    size_t from_len, to_len, count, n;
    const char* scan;
    char* out;
    char* write;
    if (!s) s = "";
    if (!from || !*from) return __btrc_str_dup(s);
    if (!to) to = "";
    from_len = strlen(from);
    to_len = strlen(to);
    count = 0;
    for (scan = s; (scan = strstr(scan, from)) != NULL; scan += from_len) count++;
    n = strlen(s);
    if (to_len > from_len) n += count * (to_len - from_len);
    out = (char*)__btrc_alloc(n + 1);
    write = out;
    scan = s;
    for (;;) {
        const char* hit = strstr(scan, from);
        if (!hit) {
            strcpy(write, scan);
            break;
        }
        memcpy(write, scan, (size_t)(hit - scan));
        write += hit - scan;
        memcpy(write, to, to_len);
        write += to_len;
        scan = hit + from_len;
    }
    return __btrc_str_track(out);
}
"#;
