//! Helper registry: named C runtime fragments emitted inline into the
//! output when their category is live.
//!
//! Each category carries its complete C source text and the categories it
//! depends on. The IR generator registers categories as it lowers; the
//! optimizer prunes the set to the transitive closure of what the emitted
//! code actually references; the emitter pastes the surviving fragments
//! verbatim, in registry order (which is dependency order).
//!
//! The monomorphized collection bodies live in [`collections`]; they are
//! templates consulted by the generics pass rather than verbatim text.

pub mod collections;

mod alloc;
mod cycles;
mod hash;
mod math;
mod strings;
mod threads;
mod trycatch;

/// One helper category: a named unit of runtime-support C source.
#[derive(Debug, Clone, Copy)]
pub struct HelperCategory {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
    /// Entry-point symbols, used by the optimizer to detect references
    /// from raw and generated text sections.
    pub symbols: &'static [&'static str],
    pub source: &'static str,
}

/// All categories, in dependency order (a category never depends on a
/// later one).
pub fn registry() -> &'static [HelperCategory] {
    &[
        HelperCategory {
            name: "alloc",
            symbols: &["__btrc_alloc", "__btrc_realloc"],
            depends_on: &[],
            source: alloc::SOURCE,
        },
        HelperCategory {
            name: "string.pool",
            symbols: &["__btrc_str_track", "__btrc_str_pool_free"],
            depends_on: &["alloc"],
            source: strings::POOL,
        },
        HelperCategory {
            name: "strings.query",
            symbols: &["__btrc_str_len", "__btrc_str_indexof", "__btrc_str_contains", "__btrc_str_startswith", "__btrc_str_endswith"],
            depends_on: &[],
            source: strings::QUERY,
        },
        HelperCategory {
            name: "strings.convert",
            symbols: &["__btrc_str_toint", "__btrc_str_tofloat", "__btrc_int_tostr", "__btrc_float_tostr"],
            depends_on: &["string.pool"],
            source: strings::CONVERT,
        },
        HelperCategory {
            name: "strings.transform",
            symbols: &["__btrc_str_dup", "__btrc_str_concat", "__btrc_str_substring", "__btrc_str_trim", "__btrc_str_toupper", "__btrc_str_tolower", "__btrc_str_replace"],
            depends_on: &["string.pool"],
            source: strings::TRANSFORM,
        },
        HelperCategory {
            name: "math.div",
            symbols: &["__btrc_div_int", "__btrc_mod_int"],
            depends_on: &[],
            source: math::SOURCE,
        },
        HelperCategory {
            name: "hash",
            symbols: &["__btrc_hash_int", "__btrc_hash_str", "__btrc_eq_str"],
            depends_on: &[],
            source: hash::SOURCE,
        },
        HelperCategory {
            name: "trycatch",
            symbols: &["__btrc_try_push", "__btrc_throw", "__btrc_rethrow", "__btrc_register_cleanup", "__btrc_run_cleanups", "__btrc_discard_cleanups", "__btrc_try_stack", "__btrc_try_top", "__btrc_error_msg", "__btrc_pending"],
            depends_on: &["alloc"],
            source: trycatch::SOURCE,
        },
        HelperCategory {
            name: "arc.cycle",
            symbols: &["__btrc_suspect", "__btrc_collect_cycles", "__btrc_note_destroyed", "__btrc_is_destroyed", "__btrc_tracking", "__btrc_suspect_count", "__btrc_destroyed_count", "__btrc_visit_fn", "__btrc_destroy_fn", "__btrc_class_visit_fn"],
            depends_on: &["alloc"],
            source: cycles::SOURCE,
        },
        HelperCategory {
            name: "threads",
            symbols: &["__btrc_thread_spawn"],
            depends_on: &["alloc"],
            source: threads::SOURCE,
        },
    ]
}

/// Look up a category by name.
pub fn category(name: &str) -> Option<&'static HelperCategory> {
    registry().iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_in_dependency_order() {
        let reg = registry();
        for (i, cat) in reg.iter().enumerate() {
            for dep in cat.depends_on {
                let dep_pos = reg
                    .iter()
                    .position(|c| c.name == *dep)
                    .unwrap_or_else(|| panic!("{} depends on unknown {}", cat.name, dep));
                assert!(dep_pos < i, "{} must come after {}", cat.name, dep);
            }
        }
    }

    #[test]
    fn every_category_defines_its_namesake_symbols() {
        assert!(category("trycatch").unwrap().source.contains("__btrc_throw"));
        assert!(category("alloc").unwrap().source.contains("__btrc_alloc"));
        assert!(category("arc.cycle").unwrap().source.contains("__btrc_collect_cycles"));
    }
}
