//! ARC cycle collection.
//!
//! Trial-deletion collector over the suspect buffer: scope exits suspect
//! still-live cyclable objects; `__btrc_collect_cycles` trial-decrements
//! through each suspect's visitor, reclaims the ones whose count fell to
//! zero (a pure cycle), and restores the rest. Cascade destruction during
//! the reclaim phase is tracked so freed memory is never read again.

pub const SOURCE: &str = r#"
typedef void (*__btrc_visit_fn)(void**);
typedef void (*__btrc_destroy_fn)(void*);
typedef void (*__btrc_class_visit_fn)(void*, __btrc_visit_fn);

typedef struct {
    void* obj;
    __btrc_class_visit_fn visit;
    __btrc_destroy_fn destroy;
} __btrc_suspect_entry;

static __btrc_suspect_entry* __btrc_suspects = NULL;
static int __btrc_suspect_count = 0;
static int __btrc_suspect_cap = 0;

static void** __btrc_destroyed = NULL;
static int __btrc_destroyed_count = 0;
static int __btrc_destroyed_cap = 0;
static int __btrc_tracking = 0;

static void __btrc_note_destroyed(void* obj) {
    if (!__btrc_tracking) return;
    if (__btrc_destroyed_count == __btrc_destroyed_cap) {
        __btrc_destroyed_cap = __btrc_destroyed_cap ? __btrc_destroyed_cap * 2 : 32;
        __btrc_destroyed = (void**)__btrc_realloc(
            __btrc_destroyed, sizeof(void*) * (size_t)__btrc_destroyed_cap);
    }
    __btrc_destroyed[__btrc_destroyed_count++] = obj;
}

static int __btrc_is_destroyed(void* obj) {
    int i;
    for (i = 0; i < __btrc_destroyed_count; i++) {
        if (__btrc_destroyed[i] == obj) return 1;
    }
    return 0;
}

static void __btrc_suspect(void* obj, __btrc_class_visit_fn visit,
                           __btrc_destroy_fn destroy) {
    int i;
    for (i = 0; i < __btrc_suspect_count; i++) {
        if (__btrc_suspects[i].obj == obj) return;
    }
    if (__btrc_suspect_count == __btrc_suspect_cap) {
        __btrc_suspect_cap = __btrc_suspect_cap ? __btrc_suspect_cap * 2 : 32;
        __btrc_suspects = (__btrc_suspect_entry*)__btrc_realloc(
            __btrc_suspects, sizeof(__btrc_suspect_entry) * (size_t)__btrc_suspect_cap);
    }
    __btrc_suspects[__btrc_suspect_count].obj = obj;
    __btrc_suspects[__btrc_suspect_count].visit = visit;
    __btrc_suspects[__btrc_suspect_count].destroy = destroy;
    __btrc_suspect_count++;
}

/* The refcount is the first field of every managed object. */
static void __btrc_trial_dec(void** field) {
    if (field && *field) {
        (*(int*)*field)--;
    }
}

static void __btrc_trial_inc(void** field) {
    if (field && *field) {
        (*(int*)*field)++;
    }
}

static void __btrc_cycle_null(void** field) {
    if (field) *field = NULL;
}

static void __btrc_collect_cycles(void) {
    int i;
    /* Phase 1: trial-decrement every edge out of a suspect. */
    for (i = 0; i < __btrc_suspect_count; i++) {
        if (__btrc_is_destroyed(__btrc_suspects[i].obj)) continue;
        __btrc_suspects[i].visit(__btrc_suspects[i].obj, __btrc_trial_dec);
    }
    /* Phase 2: anything at or below zero now is cyclic garbage. Break its
       outgoing edges first so destructors do not chase freed memory. */
    for (i = 0; i < __btrc_suspect_count; i++) {
        void* obj = __btrc_suspects[i].obj;
        if (__btrc_is_destroyed(obj)) continue;
        if (*(int*)obj <= 0) {
            __btrc_suspects[i].visit(obj, __btrc_cycle_null);
        }
    }
    for (i = 0; i < __btrc_suspect_count; i++) {
        void* obj = __btrc_suspects[i].obj;
        if (__btrc_is_destroyed(obj)) continue;
        if (*(int*)obj <= 0) {
            __btrc_note_destroyed(obj);
            __btrc_suspects[i].destroy(obj);
        }
    }
    /* Phase 3: survivors get their counts restored. */
    for (i = 0; i < __btrc_suspect_count; i++) {
        void* obj = __btrc_suspects[i].obj;
        if (__btrc_is_destroyed(obj)) continue;
        if (*(int*)obj > 0) {
            __btrc_suspects[i].visit(obj, __btrc_trial_inc);
        }
    }
    __btrc_suspect_count = 0;
}
"#;
