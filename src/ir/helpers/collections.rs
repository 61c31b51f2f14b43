//! Monomorphized collection bodies.
//!
//! C source templates for the builtin generics (`Vector`, `List`, `Array`,
//! `Map`, `Set`, `Mutex`). The monomorphization pass instantiates a
//! template per `GenericInstance` by substituting the mangled type name and
//! the concrete element types, and attaches the result to the module with
//! matching prototypes. The same machinery handles user generics; only the
//! bodies differ.

use crate::ir::nodes::{IrParam, IrProto};

/// One instantiated collection: C text plus the prototypes and helper
/// categories the rest of the module needs.
pub struct BuiltCollection {
    pub struct_name: String,
    pub text: String,
    pub protos: Vec<IrProto>,
    pub categories: Vec<&'static str>,
}

const VECTOR_TEMPLATE: &str = r#"
struct %NAME% {
    int __rc;
    %T%* data;
    int len;
    int cap;
};

%NAME%* %NAME%_new(void) {
    %NAME%* self = (%NAME%*)__btrc_alloc(sizeof(%NAME%));
    self->__rc = 1;
    self->data = NULL;
    self->len = 0;
    self->cap = 0;
    return self;
}

void %NAME%_push(%NAME%* self, %T% value) {
    if (self->len == self->cap) {
        self->cap = self->cap ? self->cap * 2 : 8;
        self->data = (%T%*)__btrc_realloc(self->data, sizeof(%T%) * (size_t)self->cap);
    }
    self->data[self->len++] = value;
}

%T% %NAME%_get(%NAME%* self, int index) {
    if (index < 0 || index >= self->len) {
        fprintf(stderr, "btrc: index %d out of bounds (len %d)\n", index, self->len);
        exit(1);
    }
    return self->data[index];
}

void %NAME%_set(%NAME%* self, int index, %T% value) {
    if (index < 0 || index >= self->len) {
        fprintf(stderr, "btrc: index %d out of bounds (len %d)\n", index, self->len);
        exit(1);
    }
    self->data[index] = value;
}

int %NAME%_len(%NAME%* self) {
    return self->len;
}

%T% %NAME%_pop(%NAME%* self) {
    if (self->len == 0) {
        fprintf(stderr, "btrc: pop from empty %NAME%\n");
        exit(1);
    }
    return self->data[--self->len];
}

void %NAME%_clear(%NAME%* self) {
    self->len = 0;
}

int %NAME%_iterLen(%NAME%* self) {
    return self->len;
}

%T% %NAME%_iterGet(%NAME%* self, int index) {
    return self->data[index];
}

void %NAME%_destroy(%NAME%* self) {
    free(self->data);
    free(self);
}
"#;

const LIST_EXTRA: &str = r#"
void %NAME%_insert(%NAME%* self, int index, %T% value) {
    int i;
    if (index < 0) index = 0;
    if (index > self->len) index = self->len;
    %NAME%_push(self, value);
    for (i = self->len - 1; i > index; i--) {
        self->data[i] = self->data[i - 1];
    }
    self->data[index] = value;
}

void %NAME%_removeAt(%NAME%* self, int index) {
    int i;
    if (index < 0 || index >= self->len) return;
    for (i = index; i < self->len - 1; i++) {
        self->data[i] = self->data[i + 1];
    }
    self->len--;
}
"#;

const ARRAY_TEMPLATE: &str = r#"
struct %NAME% {
    int __rc;
    %T%* data;
    int len;
};

%NAME%* %NAME%_new(int n) {
    %NAME%* self = (%NAME%*)__btrc_alloc(sizeof(%NAME%));
    self->__rc = 1;
    self->len = n > 0 ? n : 0;
    self->data = (%T%*)__btrc_alloc(sizeof(%T%) * (size_t)(self->len ? self->len : 1));
    return self;
}

%T% %NAME%_get(%NAME%* self, int index) {
    if (index < 0 || index >= self->len) {
        fprintf(stderr, "btrc: index %d out of bounds (len %d)\n", index, self->len);
        exit(1);
    }
    return self->data[index];
}

void %NAME%_set(%NAME%* self, int index, %T% value) {
    if (index < 0 || index >= self->len) {
        fprintf(stderr, "btrc: index %d out of bounds (len %d)\n", index, self->len);
        exit(1);
    }
    self->data[index] = value;
}

int %NAME%_len(%NAME%* self) {
    return self->len;
}

int %NAME%_iterLen(%NAME%* self) {
    return self->len;
}

%T% %NAME%_iterGet(%NAME%* self, int index) {
    return self->data[index];
}

void %NAME%_destroy(%NAME%* self) {
    free(self->data);
    free(self);
}
"#;

/// Open-addressing hash map with tombstones (used slot markers:
/// 0 empty, 1 occupied, 2 deleted).
const MAP_TEMPLATE: &str = r#"
struct %NAME% {
    int __rc;
    %K%* keys;
    %V%* vals;
    unsigned char* used;
    int len;
    int cap;
};

static unsigned long %NAME%_hash(%K% k) {
    return %HASH_EXPR%;
}

static int %NAME%_key_eq(%K% a, %K% b) {
    return %EQ_EXPR%;
}

%NAME%* %NAME%_new(void) {
    %NAME%* self = (%NAME%*)__btrc_alloc(sizeof(%NAME%));
    self->__rc = 1;
    self->keys = NULL;
    self->vals = NULL;
    self->used = NULL;
    self->len = 0;
    self->cap = 0;
    return self;
}

static int %NAME%_lookup(%NAME%* self, %K% key) {
    unsigned long i;
    if (self->cap == 0) return -1;
    i = %NAME%_hash(key) % (unsigned long)self->cap;
    for (;;) {
        if (self->used[i] == 0) return -1;
        if (self->used[i] == 1 && %NAME%_key_eq(self->keys[i], key)) return (int)i;
        i = (i + 1) % (unsigned long)self->cap;
    }
}

static void %NAME%_grow(%NAME%* self) {
    int old_cap = self->cap;
    %K%* old_keys = self->keys;
    %V%* old_vals = self->vals;
    unsigned char* old_used = self->used;
    int i;
    self->cap = old_cap ? old_cap * 2 : 16;
    self->keys = (%K%*)__btrc_alloc(sizeof(%K%) * (size_t)self->cap);
    self->vals = (%V%*)__btrc_alloc(sizeof(%V%) * (size_t)self->cap);
    self->used = (unsigned char*)__btrc_alloc((size_t)self->cap);
    self->len = 0;
    for (i = 0; i < old_cap; i++) {
        if (old_used[i] == 1) {
            %NAME%_put(self, old_keys[i], old_vals[i]);
        }
    }
    free(old_keys);
    free(old_vals);
    free(old_used);
}

void %NAME%_put(%NAME%* self, %K% key, %V% value) {
    unsigned long i;
    int existing;
    if (self->len * 2 >= self->cap) {
        %NAME%_grow(self);
    }
    existing = %NAME%_lookup(self, key);
    if (existing >= 0) {
        self->vals[existing] = value;
        return;
    }
    i = %NAME%_hash(key) % (unsigned long)self->cap;
    while (self->used[i] == 1) {
        i = (i + 1) % (unsigned long)self->cap;
    }
    self->used[i] = 1;
    self->keys[i] = key;
    self->vals[i] = value;
    self->len++;
}

%V% %NAME%_get(%NAME%* self, %K% key) {
    int i = %NAME%_lookup(self, key);
    if (i < 0) return %ZERO_V%;
    return self->vals[i];
}

int %NAME%_has(%NAME%* self, %K% key) {
    return %NAME%_lookup(self, key) >= 0;
}

void %NAME%_remove(%NAME%* self, %K% key) {
    int i = %NAME%_lookup(self, key);
    if (i < 0) return;
    self->used[i] = 2;
    self->len--;
}

int %NAME%_len(%NAME%* self) {
    return self->len;
}

int %NAME%_iterLen(%NAME%* self) {
    return self->len;
}

%K% %NAME%_iterGet(%NAME%* self, int index) {
    int i, seen = 0;
    for (i = 0; i < self->cap; i++) {
        if (self->used[i] == 1) {
            if (seen == index) return self->keys[i];
            seen++;
        }
    }
    return %ZERO_K%;
}

%V% %NAME%_iterValueAt(%NAME%* self, int index) {
    int i, seen = 0;
    for (i = 0; i < self->cap; i++) {
        if (self->used[i] == 1) {
            if (seen == index) return self->vals[i];
            seen++;
        }
    }
    return %ZERO_V%;
}

void %NAME%_destroy(%NAME%* self) {
    free(self->keys);
    free(self->vals);
    free(self->used);
    free(self);
}
"#;

const MAP_KEYS_EXTRA: &str = r#"
%KEYVEC%* %NAME%_keys(%NAME%* self) {
    %KEYVEC%* out = %KEYVEC%_new();
    int i;
    for (i = 0; i < self->cap; i++) {
        if (self->used[i] == 1) {
            %KEYVEC%_push(out, self->keys[i]);
        }
    }
    return out;
}
"#;

const SET_TEMPLATE: &str = r#"
struct %NAME% {
    int __rc;
    %T%* items;
    unsigned char* used;
    int len;
    int cap;
};

static unsigned long %NAME%_hash(%T% k) {
    return %HASH_EXPR%;
}

static int %NAME%_key_eq(%T% a, %T% b) {
    return %EQ_EXPR%;
}

%NAME%* %NAME%_new(void) {
    %NAME%* self = (%NAME%*)__btrc_alloc(sizeof(%NAME%));
    self->__rc = 1;
    self->items = NULL;
    self->used = NULL;
    self->len = 0;
    self->cap = 0;
    return self;
}

static int %NAME%_lookup(%NAME%* self, %T% key) {
    unsigned long i;
    if (self->cap == 0) return -1;
    i = %NAME%_hash(key) % (unsigned long)self->cap;
    for (;;) {
        if (self->used[i] == 0) return -1;
        if (self->used[i] == 1 && %NAME%_key_eq(self->items[i], key)) return (int)i;
        i = (i + 1) % (unsigned long)self->cap;
    }
}

static void %NAME%_grow(%NAME%* self) {
    int old_cap = self->cap;
    %T%* old_items = self->items;
    unsigned char* old_used = self->used;
    int i;
    self->cap = old_cap ? old_cap * 2 : 16;
    self->items = (%T%*)__btrc_alloc(sizeof(%T%) * (size_t)self->cap);
    self->used = (unsigned char*)__btrc_alloc((size_t)self->cap);
    self->len = 0;
    for (i = 0; i < old_cap; i++) {
        if (old_used[i] == 1) {
            %NAME%_add(self, old_items[i]);
        }
    }
    free(old_items);
    free(old_used);
}

void %NAME%_add(%NAME%* self, %T% value) {
    unsigned long i;
    if (self->len * 2 >= self->cap) {
        %NAME%_grow(self);
    }
    if (%NAME%_lookup(self, value) >= 0) return;
    i = %NAME%_hash(value) % (unsigned long)self->cap;
    while (self->used[i] == 1) {
        i = (i + 1) % (unsigned long)self->cap;
    }
    self->used[i] = 1;
    self->items[i] = value;
    self->len++;
}

int %NAME%_has(%NAME%* self, %T% value) {
    return %NAME%_lookup(self, value) >= 0;
}

void %NAME%_remove(%NAME%* self, %T% value) {
    int i = %NAME%_lookup(self, value);
    if (i < 0) return;
    self->used[i] = 2;
    self->len--;
}

int %NAME%_len(%NAME%* self) {
    return self->len;
}

int %NAME%_iterLen(%NAME%* self) {
    return self->len;
}

%T% %NAME%_iterGet(%NAME%* self, int index) {
    int i, seen = 0;
    for (i = 0; i < self->cap; i++) {
        if (self->used[i] == 1) {
            if (seen == index) return self->items[i];
            seen++;
        }
    }
    return %ZERO_T%;
}

void %NAME%_destroy(%NAME%* self) {
    free(self->items);
    free(self->used);
    free(self);
}
"#;

const MUTEX_TEMPLATE: &str = r#"
struct %NAME% {
    int __rc;
    pthread_mutex_t mu;
    %T% value;
};

%NAME%* %NAME%_new(void) {
    %NAME%* self = (%NAME%*)__btrc_alloc(sizeof(%NAME%));
    self->__rc = 1;
    pthread_mutex_init(&self->mu, NULL);
    self->value = %ZERO_T%;
    return self;
}

void %NAME%_lock(%NAME%* self) {
    pthread_mutex_lock(&self->mu);
}

void %NAME%_unlock(%NAME%* self) {
    pthread_mutex_unlock(&self->mu);
}

%T% %NAME%_get(%NAME%* self) {
    return self->value;
}

void %NAME%_set(%NAME%* self, %T% value) {
    self->value = value;
}

void %NAME%_destroy(%NAME%* self) {
    pthread_mutex_destroy(&self->mu);
    free(self);
}
"#;

/// C zero value for a type: NULL for pointers, 0 otherwise.
fn zero_for(c_type: &str) -> &'static str {
    if c_type.ends_with('*') {
        "NULL"
    } else {
        "0"
    }
}

fn hash_expr(c_type: &str, var: &str) -> String {
    if c_type == "char*" || c_type == "const char*" {
        format!("__btrc_hash_str({})", var)
    } else if c_type.ends_with('*') {
        format!("__btrc_hash_int((long)(size_t){})", var)
    } else {
        format!("__btrc_hash_int((long){})", var)
    }
}

fn eq_expr(c_type: &str) -> String {
    if c_type == "char*" || c_type == "const char*" {
        "__btrc_eq_str(a, b)".to_string()
    } else {
        "a == b".to_string()
    }
}

fn proto(ret: &str, name: String, params: Vec<(&str, &str)>) -> IrProto {
    IrProto {
        ret: ret.to_string(),
        name,
        params: params
            .into_iter()
            .map(|(t, n)| IrParam {
                c_type: t.to_string(),
                name: n.to_string(),
            })
            .collect(),
        is_static: false,
    }
}

/// Instantiate the template for one builtin-collection instance.
///
/// `name` is the mangled instance name (`Vector_int`), `c_args` the C types
/// of the type arguments. `keys_vector` carries the mangled name of
/// `Vector<K>` when `Map.keys` support should be emitted.
pub fn instantiate(
    kind: &str,
    name: &str,
    c_args: &[String],
    keys_vector: Option<&str>,
) -> Option<BuiltCollection> {
    let self_ty = format!("{}*", name);
    let st = self_ty.as_str();
    match kind {
        "Vector" | "List" => {
            let t = c_args.first()?.clone();
            let mut text = VECTOR_TEMPLATE.to_string();
            if kind == "List" {
                text.push_str(LIST_EXTRA);
            }
            let text = text.replace("%NAME%", name).replace("%T%", &t);
            let tt = t.as_str();
            let mut protos = vec![
                proto(st, format!("{}_new", name), vec![]),
                proto("void", format!("{}_push", name), vec![(st, "self"), (tt, "value")]),
                proto(tt, format!("{}_get", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_set", name), vec![(st, "self"), ("int", "index"), (tt, "value")]),
                proto("int", format!("{}_len", name), vec![(st, "self")]),
                proto(tt, format!("{}_pop", name), vec![(st, "self")]),
                proto("void", format!("{}_clear", name), vec![(st, "self")]),
                proto("int", format!("{}_iterLen", name), vec![(st, "self")]),
                proto(tt, format!("{}_iterGet", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_destroy", name), vec![(st, "self")]),
            ];
            if kind == "List" {
                protos.push(proto("void", format!("{}_insert", name), vec![(st, "self"), ("int", "index"), (tt, "value")]));
                protos.push(proto("void", format!("{}_removeAt", name), vec![(st, "self"), ("int", "index")]));
            }
            Some(BuiltCollection {
                struct_name: name.to_string(),
                text,
                protos,
                categories: vec!["alloc"],
            })
        }
        "Array" => {
            let t = c_args.first()?.clone();
            let text = ARRAY_TEMPLATE.replace("%NAME%", name).replace("%T%", &t);
            let tt = t.as_str();
            let protos = vec![
                proto(st, format!("{}_new", name), vec![("int", "n")]),
                proto(tt, format!("{}_get", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_set", name), vec![(st, "self"), ("int", "index"), (tt, "value")]),
                proto("int", format!("{}_len", name), vec![(st, "self")]),
                proto("int", format!("{}_iterLen", name), vec![(st, "self")]),
                proto(tt, format!("{}_iterGet", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_destroy", name), vec![(st, "self")]),
            ];
            Some(BuiltCollection {
                struct_name: name.to_string(),
                text,
                protos,
                categories: vec!["alloc"],
            })
        }
        "Map" => {
            let k = c_args.first()?.clone();
            let v = c_args.get(1)?.clone();
            let mut text = MAP_TEMPLATE.to_string();
            if keys_vector.is_some() {
                text.push_str(MAP_KEYS_EXTRA);
            }
            let text = text
                .replace("%NAME%", name)
                .replace("%K%", &k)
                .replace("%V%", &v)
                .replace("%HASH_EXPR%", &hash_expr(&k, "k"))
                .replace("%EQ_EXPR%", &eq_expr(&k))
                .replace("%ZERO_K%", zero_for(&k))
                .replace("%ZERO_V%", zero_for(&v))
                .replace("%KEYVEC%", keys_vector.unwrap_or(""));
            let (kk, vv) = (k.as_str(), v.as_str());
            let mut protos = vec![
                proto(st, format!("{}_new", name), vec![]),
                proto("void", format!("{}_put", name), vec![(st, "self"), (kk, "key"), (vv, "value")]),
                proto(vv, format!("{}_get", name), vec![(st, "self"), (kk, "key")]),
                proto("int", format!("{}_has", name), vec![(st, "self"), (kk, "key")]),
                proto("void", format!("{}_remove", name), vec![(st, "self"), (kk, "key")]),
                proto("int", format!("{}_len", name), vec![(st, "self")]),
                proto("int", format!("{}_iterLen", name), vec![(st, "self")]),
                proto(kk, format!("{}_iterGet", name), vec![(st, "self"), ("int", "index")]),
                proto(vv, format!("{}_iterValueAt", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_destroy", name), vec![(st, "self")]),
            ];
            if let Some(kv) = keys_vector {
                protos.push(proto(
                    &format!("{}*", kv),
                    format!("{}_keys", name),
                    vec![(st, "self")],
                ));
            }
            Some(BuiltCollection {
                struct_name: name.to_string(),
                text,
                protos,
                categories: vec!["alloc", "hash"],
            })
        }
        "Set" => {
            let t = c_args.first()?.clone();
            let text = SET_TEMPLATE
                .replace("%NAME%", name)
                .replace("%T%", &t)
                .replace("%HASH_EXPR%", &hash_expr(&t, "k"))
                .replace("%EQ_EXPR%", &eq_expr(&t))
                .replace("%ZERO_T%", zero_for(&t));
            let tt = t.as_str();
            let protos = vec![
                proto(st, format!("{}_new", name), vec![]),
                proto("void", format!("{}_add", name), vec![(st, "self"), (tt, "value")]),
                proto("int", format!("{}_has", name), vec![(st, "self"), (tt, "value")]),
                proto("void", format!("{}_remove", name), vec![(st, "self"), (tt, "value")]),
                proto("int", format!("{}_len", name), vec![(st, "self")]),
                proto("int", format!("{}_iterLen", name), vec![(st, "self")]),
                proto(tt, format!("{}_iterGet", name), vec![(st, "self"), ("int", "index")]),
                proto("void", format!("{}_destroy", name), vec![(st, "self")]),
            ];
            Some(BuiltCollection {
                struct_name: name.to_string(),
                text,
                protos,
                categories: vec!["alloc", "hash"],
            })
        }
        "Mutex" => {
            let t = c_args.first()?.clone();
            let text = MUTEX_TEMPLATE
                .replace("%NAME%", name)
                .replace("%T%", &t)
                .replace("%ZERO_T%", zero_for(&t));
            let tt = t.as_str();
            let protos = vec![
                proto(st, format!("{}_new", name), vec![]),
                proto("void", format!("{}_lock", name), vec![(st, "self")]),
                proto("void", format!("{}_unlock", name), vec![(st, "self")]),
                proto(tt, format!("{}_get", name), vec![(st, "self")]),
                proto("void", format!("{}_set", name), vec![(st, "self"), (tt, "value")]),
                proto("void", format!("{}_destroy", name), vec![(st, "self")]),
            ];
            Some(BuiltCollection {
                struct_name: name.to_string(),
                text,
                protos,
                categories: vec!["alloc", "threads"],
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_int_instantiates() {
        let built = instantiate("Vector", "Vector_int", &["int".to_string()], None).unwrap();
        assert!(built.text.contains("struct Vector_int {"));
        assert!(built.text.contains("void Vector_int_push(Vector_int* self, int value)"));
        assert!(!built.text.contains("%T%"));
        assert!(!built.text.contains("%NAME%"));
    }

    #[test]
    fn map_string_keys_use_string_hash() {
        let built = instantiate(
            "Map",
            "Map_string_int",
            &["char*".to_string(), "int".to_string()],
            None,
        )
        .unwrap();
        assert!(built.text.contains("__btrc_hash_str(k)"));
        assert!(built.text.contains("__btrc_eq_str(a, b)"));
        assert!(built.categories.contains(&"hash"));
    }

    #[test]
    fn map_keys_extra_is_conditional() {
        let without = instantiate(
            "Map",
            "Map_string_int",
            &["char*".to_string(), "int".to_string()],
            None,
        )
        .unwrap();
        assert!(!without.text.contains("_keys("));
        let with = instantiate(
            "Map",
            "Map_string_int",
            &["char*".to_string(), "int".to_string()],
            Some("Vector_string"),
        )
        .unwrap();
        assert!(with.text.contains("Vector_string* Map_string_int_keys"));
    }
}
