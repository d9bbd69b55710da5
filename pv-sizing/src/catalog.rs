//! Equipment lookup by id.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use pv_model::{Inverter, PvModule};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, UnknownEquipment};

/// Source of module and inverter records.
pub trait Catalog {
    fn module(&self, id: &str) -> Option<&PvModule>;
    fn inverter(&self, id: &str) -> Option<&Inverter>;

    fn require_module(&self, id: &str) -> Result<&PvModule, UnknownEquipment> {
        self.module(id).ok_or_else(|| UnknownEquipment {
            kind: "module",
            id: id.to_string(),
        })
    }

    fn require_inverter(&self, id: &str) -> Result<&Inverter, UnknownEquipment> {
        self.inverter(id).ok_or_else(|| UnknownEquipment {
            kind: "inverter",
            id: id.to_string(),
        })
    }
}

/// Equipment records as written in a catalog file or a project's
/// `[equipment]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EquipmentList {
    pub modules: Vec<PvModule>,
    pub inverters: Vec<Inverter>,
}

impl EquipmentList {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.inverters.is_empty()
    }
}

/// Catalog held in memory, iterating in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    modules: IndexMap<String, PvModule>,
    inverters: IndexMap<String, Inverter>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a TOML file of `[[modules]]` and `[[inverters]]` tables.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let list: EquipmentList = toml::from_str(s)?;
        let mut catalog = Self::new();
        catalog.extend(list);
        Ok(catalog)
    }

    /// Adds or replaces a module, returning the previous record.
    pub fn insert_module(&mut self, module: PvModule) -> Option<PvModule> {
        self.modules.insert(module.id.clone(), module)
    }

    pub fn insert_inverter(&mut self, inverter: Inverter) -> Option<Inverter> {
        self.inverters.insert(inverter.id.clone(), inverter)
    }

    /// Inserts every record of `list`; later records replace earlier ids.
    pub fn extend(&mut self, list: EquipmentList) {
        for module in list.modules {
            self.insert_module(module);
        }
        for inverter in list.inverters {
            self.insert_inverter(inverter);
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &PvModule> {
        self.modules.values()
    }

    pub fn inverters(&self) -> impl Iterator<Item = &Inverter> {
        self.inverters.values()
    }
}

impl Catalog for InMemoryCatalog {
    fn module(&self, id: &str) -> Option<&PvModule> {
        self.modules.get(id)
    }

    fn inverter(&self, id: &str) -> Option<&Inverter> {
        self.inverters.get(id)
    }
}

impl FromIterator<PvModule> for InMemoryCatalog {
    fn from_iter<T: IntoIterator<Item = PvModule>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for module in iter {
            catalog.insert_module(module);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::tests::{inverter_8k, module_450};

    #[test]
    fn test_lookup_by_id() {
        let mut catalog = InMemoryCatalog::new();
        catalog.insert_module(module_450());
        catalog.insert_inverter(inverter_8k(1));

        let module_id = module_450().id;
        let inverter_id = inverter_8k(1).id;
        assert_eq!(catalog.module(&module_id).map(|m| m.power_w), Some(450.0));
        assert!(catalog.inverter(&inverter_id).is_some());
        assert!(catalog.module("unknown").is_none());
    }

    #[test]
    fn test_missing_id_names_kind() {
        let catalog: InMemoryCatalog = vec![module_450()].into_iter().collect();
        assert!(catalog.require_module("m450").is_ok());
        let err = catalog.require_inverter("inv-x").unwrap_err();
        assert_eq!(
            err,
            UnknownEquipment {
                kind: "inverter",
                id: "inv-x".to_string()
            }
        );
        assert!(err.to_string().contains("inv-x"));
    }

    #[test]
    fn test_insert_replaces_and_keeps_order() {
        let mut first = module_450();
        first.id = "a".to_string();
        let mut second = module_450();
        second.id = "b".to_string();
        let mut catalog: InMemoryCatalog = vec![first.clone(), second].into_iter().collect();

        first.power_w = 455.0;
        let previous = catalog.insert_module(first);
        assert_eq!(previous.map(|m| m.power_w), Some(450.0));
        let ids: Vec<&str> = catalog.modules().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_catalog_file() {
        let toml = r#"
[[modules]]
id = "m-400"
model = "Mono 400"
power_w = 400.0
voc_v = 45.0
temp_coefficient_voc_pct = -0.29
isc_a = 10.9
cell_count = 108
area_m2 = 1.95

[[inverters]]
id = "inv-5k"
model = "String 5 kW"
rated_ac_power_w = 5000.0
max_pv_power_w = 7500.0
max_input_current_a = 16.0
mppt_count = 2
strings_per_mppt = 1
mppt_min_voltage_v = 90.0
mppt_max_voltage_v = 550.0
network_type = "single_phase"
"#;
        let catalog = InMemoryCatalog::from_toml_str(toml).unwrap();
        assert_eq!(catalog.require_module("m-400").map(|m| m.cell_count), Ok(108));
        assert_eq!(catalog.require_inverter("inv-5k").map(|i| i.mppt_count), Ok(2));
        assert!(InMemoryCatalog::from_toml_str("[[pumps]]\nid = \"p\"").is_err());
    }
}
