use std::collections::BTreeSet;

use serde::Deserialize;

use crate::registry::UnitRegistry;

/// User-declared virtual group, read-only to the core. `members: None` is
/// the wildcard selecting every known unit.
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualGroupSpec {
    pub key: String,
    pub display_name: String,
    pub members: Option<Vec<String>>,
}

/// Expand a group spec against the current registry.
///
/// Wildcard specs select every known id, ascending. Explicit specs keep
/// the declared order; ids the registry has not seen yet are omitted (they
/// join on a later refresh), and repeats after the first occurrence are
/// dropped. An empty resolution is valid.
pub fn resolve(spec: &VirtualGroupSpec, registry: &UnitRegistry) -> Vec<String> {
    match &spec.members {
        None => registry.all().map(|u| u.id.clone()).collect(),
        Some(declared) => {
            let mut seen = BTreeSet::new();
            declared
                .iter()
                .filter(|id| registry.get(id).is_some())
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhysicalUnit;

    fn registry_with(ids: &[&str]) -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.update(
            ids.iter()
                .map(|id| PhysicalUnit {
                    id: id.to_string(),
                    name: format!("Unit {id}"),
                    ..Default::default()
                })
                .collect(),
        );
        registry
    }

    fn spec(key: &str, members: Option<&[&str]>) -> VirtualGroupSpec {
        VirtualGroupSpec {
            key: key.to_string(),
            display_name: key.to_string(),
            members: members.map(|ids| ids.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn wildcard_selects_all_ascending() {
        let registry = registry_with(&["03", "01", "02"]);
        assert_eq!(
            resolve(&spec("all", None), &registry),
            ["01", "02", "03"]
        );
    }

    #[test]
    fn wildcard_against_empty_registry_is_empty() {
        let registry = UnitRegistry::new();
        assert!(resolve(&spec("all", None), &registry).is_empty());
    }

    #[test]
    fn explicit_preserves_declared_order() {
        let registry = registry_with(&["01", "02", "03"]);
        assert_eq!(
            resolve(&spec("g", Some(&["03", "01"])), &registry),
            ["03", "01"]
        );
    }

    #[test]
    fn unknown_ids_are_omitted_not_an_error() {
        let registry = registry_with(&["01"]);
        assert_eq!(
            resolve(&spec("g", Some(&["07", "01"])), &registry),
            ["01"]
        );
    }

    #[test]
    fn unknown_id_joins_once_discovered() {
        let mut registry = registry_with(&["01"]);
        let g = spec("g", Some(&["07", "01"]));
        assert_eq!(resolve(&g, &registry), ["01"]);

        registry.update(vec![
            PhysicalUnit {
                id: "01".to_string(),
                ..Default::default()
            },
            PhysicalUnit {
                id: "07".to_string(),
                ..Default::default()
            },
        ]);
        assert_eq!(resolve(&g, &registry), ["07", "01"]);
    }

    #[test]
    fn duplicate_declarations_are_dropped() {
        let registry = registry_with(&["01", "02"]);
        assert_eq!(
            resolve(&spec("g", Some(&["02", "01", "02"])), &registry),
            ["02", "01"]
        );
    }

    #[test]
    fn spec_deserializes_from_config_json() {
        let explicit: VirtualGroupSpec =
            serde_json::from_str(r#"{"key":"floor1","display_name":"First floor","members":["01","02"]}"#)
                .unwrap();
        assert_eq!(explicit.key, "floor1");
        assert_eq!(explicit.members.as_deref(), Some(&["01".to_string(), "02".to_string()][..]));

        let wildcard: VirtualGroupSpec =
            serde_json::from_str(r#"{"key":"all","display_name":"Whole building"}"#).unwrap();
        assert!(wildcard.members.is_none());
    }
}
