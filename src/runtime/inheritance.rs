//! Subtyping queries used by `checkcast`, `instanceof`, `aastore` and
//! `arraycopy`. Classes are unique per name, so name equality is identity.

use std::sync::Arc;

use crate::runtime::{ArrayKind, Class};

pub fn is_same_or_subclass(sub: &Arc<Class>, sup_name: &str) -> bool {
    let mut current = Some(sub.clone());
    while let Some(class) = current {
        if class.name.as_ref() == sup_name {
            return true;
        }
        current = class.super_class.clone();
    }
    false
}

/// Direct or transitive interface implementation, superclasses included.
pub fn implements(class: &Arc<Class>, interface_name: &str) -> bool {
    let mut current = Some(class.clone());
    while let Some(class) = current {
        if class
            .interfaces
            .iter()
            .any(|i| i.name.as_ref() == interface_name || implements(i, interface_name))
        {
            return true;
        }
        current = class.super_class.clone();
    }
    false
}

/// Whether a value of class `from` may be stored where `to` is expected,
/// JVMS 6.5.checkcast rules.
pub fn is_assignable(from: &Arc<Class>, to: &Arc<Class>) -> bool {
    if from.name == to.name {
        return true;
    }
    if from.is_primitive() || to.is_primitive() {
        return false;
    }
    if let Some(from_kind) = &from.array {
        // arrays implement exactly Object, Cloneable and Serializable
        return match to.name.as_ref() {
            "java/lang/Object" | "java/lang/Cloneable" | "java/io/Serializable" => true,
            _ => match (&to.array, from_kind) {
                (Some(ArrayKind::Primitive(b)), ArrayKind::Primitive(a)) => a == b,
                (Some(ArrayKind::Reference(b)), ArrayKind::Reference(a)) => is_assignable(a, b),
                _ => false,
            },
        };
    }
    if to.is_interface() {
        return from.is_interface() && is_same_or_subclass_interface(from, &to.name)
            || implements(from, &to.name);
    }
    is_same_or_subclass(from, &to.name)
}

fn is_same_or_subclass_interface(sub: &Arc<Class>, sup_name: &str) -> bool {
    sub.name.as_ref() == sup_name
        || sub
            .interfaces
            .iter()
            .any(|i| is_same_or_subclass_interface(i, sup_name))
}
