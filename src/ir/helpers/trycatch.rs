//! setjmp/longjmp-based try/catch runtime with exception-path cleanup.
//!
//! A per-thread stack of jump buffers, a current-exception slot, a pending
//! flag (for deterministic re-throw after `finally`), and a cleanup stack
//! that releases ARC-tracked locals allocated inside `try` when an
//! exception unwinds past them.

pub const SOURCE: &str = r#"
static _Thread_local int __btrc_try_cap = 16;
static _Thread_local jmp_buf* __btrc_try_stack = NULL;
static _Thread_local int __btrc_try_top = -1;
static _Thread_local char __btrc_error_msg[1024] = "";
static _Thread_local int __btrc_pending = 0;

typedef void (*__btrc_cleanup_fn)(void*);
typedef struct {
    void** ptr_ref;
    __btrc_cleanup_fn fn;
    int try_level;
} __btrc_cleanup_entry;
static _Thread_local int __btrc_cleanup_cap = 64;
static _Thread_local __btrc_cleanup_entry* __btrc_cleanup_stack = NULL;
static _Thread_local int __btrc_cleanup_top = -1;

static void __btrc_try_push(void) {
    if (!__btrc_try_stack) {
        __btrc_try_stack = (jmp_buf*)__btrc_alloc(sizeof(jmp_buf) * (size_t)__btrc_try_cap);
    }
    if (__btrc_try_top + 1 >= __btrc_try_cap) {
        __btrc_try_cap *= 2;
        __btrc_try_stack = (jmp_buf*)__btrc_realloc(
            __btrc_try_stack, sizeof(jmp_buf) * (size_t)__btrc_try_cap);
    }
    __btrc_try_top++;
}

static void __btrc_register_cleanup(void** ptr_ref, __btrc_cleanup_fn fn) {
    if (!__btrc_cleanup_stack) {
        __btrc_cleanup_stack = (__btrc_cleanup_entry*)__btrc_alloc(
            sizeof(__btrc_cleanup_entry) * (size_t)__btrc_cleanup_cap);
    }
    if (__btrc_cleanup_top + 1 >= __btrc_cleanup_cap) {
        __btrc_cleanup_cap *= 2;
        __btrc_cleanup_stack = (__btrc_cleanup_entry*)__btrc_realloc(
            __btrc_cleanup_stack,
            sizeof(__btrc_cleanup_entry) * (size_t)__btrc_cleanup_cap);
    }
    __btrc_cleanup_top++;
    __btrc_cleanup_stack[__btrc_cleanup_top].ptr_ref = ptr_ref;
    __btrc_cleanup_stack[__btrc_cleanup_top].fn = fn;
    __btrc_cleanup_stack[__btrc_cleanup_top].try_level = __btrc_try_top;
}

static void __btrc_run_cleanups(int level) {
    while (__btrc_cleanup_top >= 0 &&
           __btrc_cleanup_stack[__btrc_cleanup_top].try_level >= level) {
        __btrc_cleanup_entry e = __btrc_cleanup_stack[__btrc_cleanup_top--];
        if (e.fn && e.ptr_ref && *e.ptr_ref) {
            e.fn(*e.ptr_ref);
            *e.ptr_ref = NULL;
        }
    }
}

static void __btrc_discard_cleanups(int level) {
    while (__btrc_cleanup_top >= 0 &&
           __btrc_cleanup_stack[__btrc_cleanup_top].try_level >= level) {
        __btrc_cleanup_top--;
    }
}

static void __btrc_throw(const char* msg) {
    if (__btrc_try_top < 0) {
        fprintf(stderr, "Unhandled exception: %s\n", msg ? msg : "");
        exit(1);
    }
    strncpy(__btrc_error_msg, msg ? msg : "", sizeof __btrc_error_msg - 1);
    __btrc_error_msg[sizeof __btrc_error_msg - 1] = '\0';
    __btrc_pending = 1;
    __btrc_run_cleanups(__btrc_try_top);
    longjmp(__btrc_try_stack[__btrc_try_top--], 1);
}

static void __btrc_rethrow(void) {
    if (__btrc_pending) {
        __btrc_throw(__btrc_error_msg);
    }
}
"#;
