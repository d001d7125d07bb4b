use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use super::dataset::{ParameterSetRecord, ReferenceDataset};
use super::snapshot::ReferenceSnapshot;
use super::types::{
    BrandSustainabilityProfile, CalculationParameter, ClothingTypeProfile, DataQuality,
    MaterialImpactFactor, StageMultipliers,
};
use super::{normalize_brand_name, normalize_key, ReferenceStore};
use crate::error::ImpactError;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    INSERT OR IGNORE INTO store_meta (key, value) VALUES ('generation', '0');

    CREATE TABLE IF NOT EXISTS materials (
        name TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        co2_per_kg REAL NOT NULL,
        water_liters_per_kg REAL,
        energy_mj_per_kg REAL,
        spinning_multiplier REAL,
        weaving_multiplier REAL,
        dyeing_multiplier REAL,
        finishing_multiplier REAL,
        data_quality TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT '',
        last_updated TEXT
    );

    CREATE TABLE IF NOT EXISTS default_material (
        slot INTEGER PRIMARY KEY CHECK (slot = 1),
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        co2_per_kg REAL NOT NULL,
        water_liters_per_kg REAL,
        energy_mj_per_kg REAL,
        spinning_multiplier REAL,
        weaving_multiplier REAL,
        dyeing_multiplier REAL,
        finishing_multiplier REAL,
        data_quality TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT '',
        last_updated TEXT
    );

    CREATE TABLE IF NOT EXISTS category_hints (
        name TEXT PRIMARY KEY,
        category TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clothing_types (
        label TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        typical_weight_grams INTEGER NOT NULL,
        weight_range_min INTEGER NOT NULL,
        weight_range_max INTEGER NOT NULL,
        typical_wears INTEGER NOT NULL,
        wash_frequency REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS calculation_parameters (
        version TEXT NOT NULL,
        name TEXT NOT NULL,
        value REAL NOT NULL,
        unit TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        effective_date TEXT,
        PRIMARY KEY (version, name)
    );

    CREATE TABLE IF NOT EXISTS brands (
        name_normalized TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        transparency_score INTEGER,
        transparency_year INTEGER,
        publishes_supplier_list INTEGER NOT NULL DEFAULT 0,
        discloses_ghg_emissions INTEGER NOT NULL DEFAULT 0,
        discloses_water_usage INTEGER NOT NULL DEFAULT 0,
        discloses_waste_data INTEGER NOT NULL DEFAULT 0,
        has_living_wage_commitment INTEGER NOT NULL DEFAULT 0,
        has_climate_targets INTEGER NOT NULL DEFAULT 0,
        last_updated TEXT
    );
";

/// SQLite-backed reference store.
///
/// Every write bumps the `generation` row in `store_meta`. Loaders that
/// write to the database from outside this type must bump it too, or
/// cached snapshots will not be refreshed.
pub struct SqliteReferenceStore {
    conn: Mutex<Connection>,
    cached: Mutex<Option<Arc<ReferenceSnapshot>>>,
}

impl SqliteReferenceStore {
    /// Open or create the reference database at the given path.
    pub fn new(db_path: &Path) -> Result<Self, ImpactError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ImpactError::Store(format!("Failed to create data dir: {}", e)))?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            ImpactError::Store(format!(
                "Failed to open reference database at {:?}: {}",
                db_path, e
            ))
        })?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| ImpactError::Store(format!("Failed to create reference tables: {}", e)))?;

        info!("Opened reference database at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
            cached: Mutex::new(None),
        })
    }

    pub fn upsert_material(&self, material: &MaterialImpactFactor) -> Result<u64, ImpactError> {
        self.write(|tx| insert_material(tx, material))
    }

    /// Set the factor used when neither a material nor its category is known.
    ///
    /// The default lives in its own single-row table, so it never collides
    /// with a registered material of the same name.
    pub fn set_default_material(
        &self,
        material: &MaterialImpactFactor,
    ) -> Result<u64, ImpactError> {
        self.write(|tx| insert_default_material(tx, material))
    }

    pub fn set_category_hint(&self, name: &str, category: &str) -> Result<u64, ImpactError> {
        self.write(|tx| insert_category_hint(tx, name, category))
    }

    pub fn upsert_clothing_type(&self, profile: &ClothingTypeProfile) -> Result<u64, ImpactError> {
        self.write(|tx| insert_clothing_type(tx, profile))
    }

    pub fn upsert_parameter(
        &self,
        version: &str,
        parameter: &CalculationParameter,
    ) -> Result<u64, ImpactError> {
        self.write(|tx| insert_parameter(tx, version, parameter))
    }

    pub fn set_active_parameter_set(&self, version: &str) -> Result<u64, ImpactError> {
        self.write(|tx| set_meta(tx, "active_parameter_set", version.trim()))
    }

    pub fn upsert_brand(&self, brand: &BrandSustainabilityProfile) -> Result<u64, ImpactError> {
        self.write(|tx| insert_brand(tx, brand))
    }

    /// Write a whole dataset in one transaction (one generation bump).
    pub fn import_dataset(&self, dataset: &ReferenceDataset) -> Result<u64, ImpactError> {
        let generation = self.write(|tx| {
            if let Some(default) = &dataset.default_material {
                insert_default_material(tx, default)?;
            }
            for material in &dataset.materials {
                insert_material(tx, material)?;
            }
            for (name, category) in &dataset.category_hints {
                insert_category_hint(tx, name, category)?;
            }
            for profile in &dataset.clothing_types {
                insert_clothing_type(tx, profile)?;
            }
            for set in &dataset.parameter_sets {
                for parameter in &set.parameters {
                    insert_parameter(tx, &set.version, parameter)?;
                }
            }
            if let Some(active) = &dataset.active_parameter_set {
                set_meta(tx, "active_parameter_set", active.trim())?;
            }
            for brand in &dataset.brands {
                insert_brand(tx, brand)?;
            }
            Ok(())
        })?;

        info!(
            "Imported {} materials, {} clothing types, {} parameter sets, {} brands \
             (generation {})",
            dataset.materials.len(),
            dataset.clothing_types.len(),
            dataset.parameter_sets.len(),
            dataset.brands.len(),
            generation
        );
        Ok(generation)
    }

    /// Run `f` in a write transaction and bump the generation.
    fn write<F>(&self, f: F) -> Result<u64, ImpactError>
    where
        F: FnOnce(&Transaction) -> rusqlite::Result<()>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| ImpactError::Store("reference database lock poisoned".to_string()))?;

        let tx = conn.transaction()?;
        f(&tx)?;
        tx.execute(
            "UPDATE store_meta SET value = CAST(value AS INTEGER) + 1 WHERE key = 'generation'",
            [],
        )?;
        let generation = read_generation(&tx)?;
        tx.commit()?;
        Ok(generation)
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, ImpactError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| ImpactError::Store("reference database lock poisoned".to_string()))?;

        // One read transaction: the generation check and every table read
        // see the same database state.
        let tx = conn.transaction()?;
        let generation = read_generation(&tx)?;

        let mut cached = self
            .cached
            .lock()
            .map_err(|_| ImpactError::Store("snapshot cache lock poisoned".to_string()))?;
        if let Some(snapshot) = cached.as_ref().filter(|s| s.generation() == generation) {
            debug!("Reusing cached reference snapshot (generation {})", generation);
            return Ok(Arc::clone(snapshot));
        }

        let dataset = read_dataset(&tx)?;
        tx.commit()?;

        let snapshot = Arc::new(ReferenceSnapshot::from_dataset(dataset, generation));
        *cached = Some(Arc::clone(&snapshot));
        debug!("Materialised reference snapshot (generation {})", generation);
        Ok(snapshot)
    }
}

// =============================================================================
// WRITES
// =============================================================================

fn insert_material(tx: &Transaction, material: &MaterialImpactFactor) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO materials
         (name, category, co2_per_kg, water_liters_per_kg, energy_mj_per_kg,
          spinning_multiplier, weaving_multiplier, dyeing_multiplier, finishing_multiplier,
          data_quality, source, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            normalize_key(&material.name),
            normalize_key(&material.category),
            material.co2_per_kg,
            material.water_liters_per_kg,
            material.energy_mj_per_kg,
            material.multipliers.spinning,
            material.multipliers.weaving,
            material.multipliers.dyeing,
            material.multipliers.finishing,
            material.data_quality.as_str(),
            material.source,
            format_date(material.last_updated),
        ],
    )?;
    Ok(())
}

fn insert_default_material(
    tx: &Transaction,
    material: &MaterialImpactFactor,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO default_material
         (slot, name, category, co2_per_kg, water_liters_per_kg, energy_mj_per_kg,
          spinning_multiplier, weaving_multiplier, dyeing_multiplier, finishing_multiplier,
          data_quality, source, last_updated)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            normalize_key(&material.name),
            normalize_key(&material.category),
            material.co2_per_kg,
            material.water_liters_per_kg,
            material.energy_mj_per_kg,
            material.multipliers.spinning,
            material.multipliers.weaving,
            material.multipliers.dyeing,
            material.multipliers.finishing,
            material.data_quality.as_str(),
            material.source,
            format_date(material.last_updated),
        ],
    )?;
    Ok(())
}

fn insert_category_hint(tx: &Transaction, name: &str, category: &str) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO category_hints (name, category) VALUES (?1, ?2)",
        params![normalize_key(name), normalize_key(category)],
    )?;
    Ok(())
}

fn insert_clothing_type(tx: &Transaction, profile: &ClothingTypeProfile) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO clothing_types
         (label, category, typical_weight_grams, weight_range_min, weight_range_max,
          typical_wears, wash_frequency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            normalize_key(&profile.label),
            profile.category,
            profile.typical_weight_grams,
            profile.weight_range_min,
            profile.weight_range_max,
            profile.typical_wears,
            profile.wash_frequency,
        ],
    )?;
    Ok(())
}

fn insert_parameter(
    tx: &Transaction,
    version: &str,
    parameter: &CalculationParameter,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO calculation_parameters
         (version, name, value, unit, description, source, effective_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            version.trim(),
            parameter.name.trim(),
            parameter.value,
            parameter.unit,
            parameter.description,
            parameter.source,
            format_date(parameter.effective_date),
        ],
    )?;
    Ok(())
}

fn insert_brand(tx: &Transaction, brand: &BrandSustainabilityProfile) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO brands
         (name_normalized, name, transparency_score, transparency_year,
          publishes_supplier_list, discloses_ghg_emissions, discloses_water_usage,
          discloses_waste_data, has_living_wage_commitment, has_climate_targets, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            normalize_brand_name(&brand.name),
            brand.name,
            brand.transparency_score,
            brand.transparency_year,
            brand.publishes_supplier_list,
            brand.discloses_ghg_emissions,
            brand.discloses_water_usage,
            brand.discloses_waste_data,
            brand.has_living_wage_commitment,
            brand.has_climate_targets,
            format_date(brand.last_updated),
        ],
    )?;
    Ok(())
}

fn set_meta(tx: &Transaction, key: &str, value: &str) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

// =============================================================================
// READS
// =============================================================================

fn read_generation(tx: &Transaction) -> rusqlite::Result<u64> {
    let value: String = tx.query_row(
        "SELECT value FROM store_meta WHERE key = 'generation'",
        [],
        |row| row.get(0),
    )?;
    value
        .parse::<u64>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn read_dataset(tx: &Transaction) -> rusqlite::Result<ReferenceDataset> {
    let materials = read_materials(tx, "materials")?;
    let default_material = read_materials(tx, "default_material")?.into_iter().next();

    let category_hints: BTreeMap<String, String> = {
        let mut stmt = tx.prepare("SELECT name, category FROM category_hints")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let clothing_types = {
        let mut stmt = tx.prepare(
            "SELECT label, category, typical_weight_grams, weight_range_min, weight_range_max,
                    typical_wears, wash_frequency
             FROM clothing_types ORDER BY label",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClothingTypeProfile {
                label: row.get(0)?,
                category: row.get(1)?,
                typical_weight_grams: row.get(2)?,
                weight_range_min: row.get(3)?,
                weight_range_max: row.get(4)?,
                typical_wears: row.get(5)?,
                wash_frequency: row.get(6)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut parameter_sets: Vec<ParameterSetRecord> = Vec::new();
    {
        let mut stmt = tx.prepare(
            "SELECT version, name, value, unit, description, source, effective_date
             FROM calculation_parameters ORDER BY version, name",
        )?;
        let rows = stmt.query_map([], |row| {
            let version: String = row.get(0)?;
            let parameter = CalculationParameter {
                name: row.get(1)?,
                value: row.get(2)?,
                unit: row.get(3)?,
                description: row.get(4)?,
                source: row.get(5)?,
                effective_date: parse_date(6, row.get(6)?)?,
            };
            Ok((version, parameter))
        })?;
        for row in rows {
            let (version, parameter) = row?;
            match parameter_sets.last_mut() {
                Some(set) if set.version == version => set.parameters.push(parameter),
                _ => parameter_sets.push(ParameterSetRecord {
                    version,
                    parameters: vec![parameter],
                }),
            }
        }
    }

    let active_parameter_set = tx
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'active_parameter_set'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let brands = {
        let mut stmt = tx.prepare(
            "SELECT name, transparency_score, transparency_year, publishes_supplier_list,
                    discloses_ghg_emissions, discloses_water_usage, discloses_waste_data,
                    has_living_wage_commitment, has_climate_targets, last_updated
             FROM brands ORDER BY name_normalized",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BrandSustainabilityProfile {
                name: row.get(0)?,
                transparency_score: row.get(1)?,
                transparency_year: row.get(2)?,
                publishes_supplier_list: row.get(3)?,
                discloses_ghg_emissions: row.get(4)?,
                discloses_water_usage: row.get(5)?,
                discloses_waste_data: row.get(6)?,
                has_living_wage_commitment: row.get(7)?,
                has_climate_targets: row.get(8)?,
                last_updated: parse_date(9, row.get(9)?)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(ReferenceDataset {
        default_material,
        materials,
        category_hints,
        clothing_types,
        active_parameter_set,
        parameter_sets,
        brands,
    })
}

/// Read every row of a material-shaped table.
fn read_materials(tx: &Transaction, table: &str) -> rusqlite::Result<Vec<MaterialImpactFactor>> {
    let mut stmt = tx.prepare(&format!(
        "SELECT name, category, co2_per_kg, water_liters_per_kg, energy_mj_per_kg,
                spinning_multiplier, weaving_multiplier, dyeing_multiplier,
                finishing_multiplier, data_quality, source, last_updated
         FROM {} ORDER BY name",
        table
    ))?;
    let rows = stmt.query_map([], material_from_row)?;
    rows.collect()
}

fn material_from_row(row: &Row) -> rusqlite::Result<MaterialImpactFactor> {
    let quality: String = row.get(9)?;
    let data_quality = quality.parse::<DataQuality>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, Type::Text, e.into())
    })?;

    Ok(MaterialImpactFactor {
        name: row.get(0)?,
        category: row.get(1)?,
        co2_per_kg: row.get(2)?,
        water_liters_per_kg: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        energy_mj_per_kg: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        multipliers: StageMultipliers {
            spinning: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            weaving: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
            dyeing: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
            finishing: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
        },
        data_quality,
        source: row.get(10)?,
        last_updated: parse_date(11, row.get(11)?)?,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
}
