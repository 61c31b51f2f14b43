//! Monomorphization.
//!
//! Every `GenericInstance` becomes a specialized struct plus a full method
//! set with the type parameters substituted, named by the deterministic
//! mangling (`Vector_int`, `Map_string_int`, `Box_Dog`). Builtin
//! collections instantiate the registry templates; user generics lower
//! their class bodies under an active substitution. Instances discovered
//! while lowering (a generic body mentioning another generic) join the
//! worklist, so the processed set is closed under appears-in-body.

use std::collections::HashMap;

use crate::analyzer::GenericInstance;
use crate::ir::helpers::collections;

use super::IrGenerator;

impl<'a> IrGenerator<'a> {
    /// Instantiate a builtin collection template for one instance.
    pub fn emit_builtin_collection(&mut self, inst: &GenericInstance) {
        let args = inst.args.clone();
        let mangled = {
            let parts: Vec<String> = args.iter().map(|a| self.mangle_ty(a)).collect();
            format!("{}_{}", inst.base, parts.join("_"))
        };
        let c_args: Vec<String> = args.iter().map(|a| self.c_type(a)).collect();

        // `Map.keys` support is emitted only when the key vector type
        // exists somewhere in the program.
        let keys_vector = if inst.base == "Map" {
            let key = args[0].clone();
            if self.instance_requested("Vector", std::slice::from_ref(&key)) {
                let key_mangled = self.mangle_ty(&key);
                Some(format!("Vector_{}", key_mangled))
            } else {
                None
            }
        } else {
            None
        };

        let built = match collections::instantiate(
            &inst.base,
            &mangled,
            &c_args,
            keys_vector.as_deref(),
        ) {
            Some(b) => b,
            None => return,
        };

        // The forward declaration went out when the instance was first
        // recorded; only the body and prototypes remain.
        debug_assert_eq!(built.struct_name, mangled);
        self.module.protos.extend(built.protos);
        self.module.generated.push(built.text);
        for category in built.categories {
            self.use_helper(category);
        }
        if inst.base == "Mutex" {
            self.need_pthread();
        }
    }

    /// Lower a user generic class body under the instance substitution.
    pub fn emit_generic_class_instance(&mut self, inst: &GenericInstance) {
        let info = match self.analysis.classes.get(&inst.base) {
            Some(i) => i.clone(),
            None => return,
        };
        if info.generic_params.len() != inst.args.len() {
            return;
        }
        let mangled = {
            let parts: Vec<String> = inst.args.iter().map(|a| self.mangle_ty(a)).collect();
            format!("{}_{}", inst.base, parts.join("_"))
        };

        let saved_subst = std::mem::take(&mut self.subst);
        self.subst = info
            .generic_params
            .iter()
            .cloned()
            .zip(inst.args.iter().cloned())
            .collect::<HashMap<_, _>>();

        self.emit_class(&inst.base, Some(mangled));

        self.subst = saved_subst;
    }
}
