//! Thread spawn shim over POSIX threads.
//!
//! `spawn` is fire-and-forget: the thread is created detached and the
//! capture environment (retained at the spawn site) is released by the
//! runner after the body returns.

pub const SOURCE: &str = r#"
typedef struct {
    void (*fn)(void*);
    void* env;
    int env_is_object;
} __btrc_thread_start;

static void* __btrc_thread_runner(void* arg) {
    __btrc_thread_start* start = (__btrc_thread_start*)arg;
    start->fn(start->env);
    if (start->env_is_object && start->env) {
        /* The refcount is the first field of every managed object. */
        if (--(*(int*)start->env) <= 0) {
            free(start->env);
        }
    } else if (start->env) {
        free(start->env);
    }
    free(start);
    return NULL;
}

static void __btrc_thread_spawn(void (*fn)(void*), void* env, int env_is_object) {
    pthread_t tid;
    pthread_attr_t attr;
    __btrc_thread_start* start =
        (__btrc_thread_start*)__btrc_alloc(sizeof(__btrc_thread_start));
    start->fn = fn;
    start->env = env;
    start->env_is_object = env_is_object;
    pthread_attr_init(&attr);
    pthread_attr_setdetachstate(&attr, PTHREAD_CREATE_DETACHED);
    if (pthread_create(&tid, &attr, __btrc_thread_runner, start) != 0) {
        fprintf(stderr, "btrc: thread spawn failed\n");
        exit(1);
    }
    pthread_attr_destroy(&attr);
}
"#;
