//! Process-wide alias registry (spec.md §3 "Alias registry", §4.C "Alias
//! lifecycle"). Registering an alias is idempotent replacement; forward and
//! recursive references are legal because resolution is deferred to plan
//! time rather than performed eagerly inside a builder method.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock};

use crate::error::DecodeError;
use crate::node::TypeRef;
use crate::schema::Schema;

fn registry() -> &'static Mutex<HashMap<String, Schema>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Schema>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers `schema` under `name`, replacing any previous registration
/// (write-last-wins, spec.md §4.C).
pub fn register(name: String, schema: Schema) {
    registry()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .insert(name, schema);
}

/// Looks up a registered alias by name, cloning the compiled schema out of
/// the registry so callers can plan/decode/encode against it without
/// holding the registry lock.
pub fn get(name: &str) -> Option<Schema> {
    registry()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .get(name)
        .cloned()
}

/// Walks every alias `root` transitively references (through array element
/// types, choice branches, nests, and pointer targets) and confirms each is
/// registered. Planning a root that references an unregistered alias fails
/// with `UnknownAlias` (spec.md §4.C).
///
/// `requested` tracks names already visited in this walk; a name is marked
/// requested before its own referenced aliases are walked, so mutual
/// recursion (`A` referencing `B` referencing `A`) terminates: requesting an
/// already-requested alias is a no-op rather than a re-walk (spec.md §4.D
/// "Alias dispatch", §9).
pub fn validate_references(root: &Schema) -> Result<(), DecodeError> {
    let mut requested: HashSet<String> = HashSet::new();
    walk_schema(root, &mut requested)
}

fn walk_schema(schema: &Schema, requested: &mut HashSet<String>) -> Result<(), DecodeError> {
    for node in &schema.nodes {
        if let Some(ty) = &node.options.ty {
            walk_type_ref(ty, requested)?;
        }
        if let Some(choices) = &node.options.choices {
            for ty in choices.values() {
                walk_type_ref(ty, requested)?;
            }
        }
        if let Some(ty) = &node.options.default_choice {
            walk_type_ref(ty, requested)?;
        }
    }
    Ok(())
}

fn walk_type_ref(ty: &TypeRef, requested: &mut HashSet<String>) -> Result<(), DecodeError> {
    match ty {
        TypeRef::Primitive(_, _) => Ok(()),
        TypeRef::Inline(schema) => walk_schema(schema, requested),
        TypeRef::Alias(name) => {
            if requested.contains(name) {
                return Ok(());
            }
            requested.insert(name.clone());

            let aliased = get(name).ok_or_else(|| DecodeError::UnknownAlias(name.clone()))?;
            walk_schema(&aliased, requested)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn unregistered_alias_fails_validation() {
        let schema = Schema::start().uint8("t").nest_alias("v", "does-not-exist-xyz");
        assert!(matches!(
            validate_references(&schema),
            Err(DecodeError::UnknownAlias(_))
        ));
    }

    #[test]
    fn mutually_recursive_aliases_validate_without_looping() {
        let leaf = Schema::start().uint8("val");
        register("mutual-a".to_string(), leaf);

        let a_ref = Schema::start().uint8("val").nest_alias("next", "mutual-b");
        register("mutual-a".to_string(), a_ref);
        let b_ref = Schema::start().uint8("val").nest_alias("next", "mutual-a");
        register("mutual-b".to_string(), b_ref);

        let root = get("mutual-a").unwrap();
        assert!(validate_references(&root).is_ok());
    }
}
