use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Known model readers, in code order (integer identifier = index).
pub const MODELS: &[&str] = &[
    "CTIPe",
    "DTM",
    "GITM",
    "IRI",
    "OpenGGCM_GM",
    "SWMF_IE",
    "TIEGCM",
    "WACCMX",
    "WAM-IPE",
    "Weimer",
];

/// Coordinate systems, in code order (GDZ = 0 and so on). `teme` is
/// the SGP4-native inertial frame and is accepted by name only.
pub const COORD_SYSTEMS: &[&str] = &["GDZ", "GEO", "GSM", "GSE", "SM", "GEI", "MAG", "SPH", "RLL"];

/// Coordinate grids, in code order.
pub const COORD_GRIDS: &[&str] = &["sph", "car"];

/// Standardized variable names with default units, in code order.
const VARIABLES: &[(&str, &str)] = &[
    ("rho", "kg/m^3"),
    ("N_n", "1/m^3"),
    ("N_e", "1/m^3"),
    ("T_n", "K"),
    ("T_e", "K"),
    ("T_i", "K"),
    ("TEC", "10**16/m**2"),
    ("u_n", "m/s"),
    ("v_n", "m/s"),
    ("w_n", "m/s"),
    ("B_x", "nT"),
    ("B_y", "nT"),
    ("B_z", "nT"),
    ("E_x", "mV/m"),
    ("E_y", "mV/m"),
    ("E_z", "mV/m"),
];

/// A model, variable, or coordinate identifier as supplied by a caller:
/// either an integer code or a (possibly already canonical) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Code(i64),
    Name(String),
}

impl From<&str> for Identifier {
    fn from(token: &str) -> Self {
        match token.trim().parse::<i64>() {
            Ok(code) => Identifier::Code(code),
            Err(_) => Identifier::Name(token.trim().to_string()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Code(code) => write!(f, "{code}"),
            Identifier::Name(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown model '{0}'; known models: {models}", models = MODELS.join(", "))]
    UnknownModel(String),
    #[error("unknown coordinate system '{0}'; known systems: {systems}", systems = COORD_SYSTEMS.join(", "))]
    UnknownCoordSystem(String),
    #[error("unknown coordinate grid '{0}'; expected sph or car")]
    UnknownCoordGrid(String),
    #[error("unknown variable code {0}")]
    UnknownVariableCode(i64),
}

fn lookup(table: &[&str], id: &Identifier) -> Option<String> {
    match id {
        Identifier::Code(code) => usize::try_from(*code)
            .ok()
            .and_then(|i| table.get(i))
            .map(|s| s.to_string()),
        Identifier::Name(name) => table
            .iter()
            .find(|entry| entry.eq_ignore_ascii_case(name))
            .map(|s| s.to_string()),
    }
}

/// Resolve a model identifier to its canonical name.
pub fn resolve_model(id: &Identifier) -> Result<String, RegistryError> {
    lookup(MODELS, id).ok_or_else(|| RegistryError::UnknownModel(id.to_string()))
}

/// Resolve a coordinate-system identifier to its canonical name.
pub fn resolve_coord_system(id: &Identifier) -> Result<String, RegistryError> {
    if let Identifier::Name(name) = id {
        if name.eq_ignore_ascii_case("teme") {
            return Ok("teme".to_string());
        }
    }
    lookup(COORD_SYSTEMS, id).ok_or_else(|| RegistryError::UnknownCoordSystem(id.to_string()))
}

/// Resolve a coordinate-grid identifier (`sph`/`car` or 0/1).
pub fn resolve_coord_grid(id: &Identifier) -> Result<String, RegistryError> {
    lookup(COORD_GRIDS, id).ok_or_else(|| RegistryError::UnknownCoordGrid(id.to_string()))
}

/// Resolve variable identifiers for a model. Integer codes index the
/// standardized table; names pass through unchanged, since models may
/// define variables beyond the standardized set.
pub fn resolve_variables(ids: &[Identifier]) -> Result<Vec<String>, RegistryError> {
    ids.iter()
        .map(|id| match id {
            Identifier::Code(code) => usize::try_from(*code)
                .ok()
                .and_then(|i| VARIABLES.get(i))
                .map(|(name, _)| name.to_string())
                .ok_or(RegistryError::UnknownVariableCode(*code)),
            Identifier::Name(name) => Ok(name.clone()),
        })
        .collect()
}

/// Default units for standardized variables; unknown variables map to
/// an empty unit, for model readers to override.
pub fn variable_units(variables: &[String]) -> BTreeMap<String, String> {
    variables
        .iter()
        .map(|v| {
            let units = VARIABLES
                .iter()
                .find(|(name, _)| name == v)
                .map(|(_, u)| *u)
                .unwrap_or("");
            (v.clone(), units.to_string())
        })
        .collect()
}

/// Units of the trajectory columns for a coordinate system and grid.
/// Spherical: (deg, deg, km for GDZ altitude, R_E otherwise);
/// cartesian: R_E throughout.
pub fn coord_units(coord_type: &str, coord_grid: &str) -> BTreeMap<String, String> {
    let mut units = BTreeMap::new();
    units.insert("utc_time".to_string(), "s".to_string());
    units.insert("net_idx".to_string(), String::new());
    if coord_grid == "sph" {
        units.insert("c1".to_string(), "deg".to_string());
        units.insert("c2".to_string(), "deg".to_string());
        let vertical = if coord_type == "GDZ" { "km" } else { "R_E" };
        units.insert("c3".to_string(), vertical.to_string());
    } else {
        for c in ["c1", "c2", "c3"] {
            units.insert(c.to_string(), "R_E".to_string());
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_token_classification() {
        assert_eq!(Identifier::from("3"), Identifier::Code(3));
        assert_eq!(Identifier::from("IRI"), Identifier::Name("IRI".to_string()));
    }

    #[test]
    fn model_codes_and_names_resolve() {
        assert_eq!(resolve_model(&Identifier::Code(0)).unwrap(), "CTIPe");
        assert_eq!(resolve_model(&Identifier::from("tiegcm")).unwrap(), "TIEGCM");
        assert!(resolve_model(&Identifier::from("NOPE")).is_err());
        assert!(resolve_model(&Identifier::Code(99)).is_err());
    }

    #[test]
    fn unknown_identifier_messages_list_the_tables() {
        let msg = resolve_model(&Identifier::from("NOPE")).unwrap_err().to_string();
        assert!(msg.contains("NOPE"));
        assert!(msg.contains("CTIPe") && msg.contains("Weimer"));

        let msg = resolve_coord_system(&Identifier::from("ECEF"))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("ECEF"));
        assert!(msg.contains("GDZ") && msg.contains("RLL"));
    }

    #[test]
    fn coord_codes_follow_table_order() {
        assert_eq!(resolve_coord_system(&Identifier::Code(0)).unwrap(), "GDZ");
        assert_eq!(resolve_coord_system(&Identifier::Code(7)).unwrap(), "SPH");
        assert_eq!(resolve_coord_system(&Identifier::from("teme")).unwrap(), "teme");
        assert_eq!(resolve_coord_grid(&Identifier::Code(1)).unwrap(), "car");
    }

    #[test]
    fn variable_codes_resolve_names_pass_through() {
        let vars = resolve_variables(&[
            Identifier::Code(0),
            Identifier::from("T_custom"),
        ])
        .unwrap();
        assert_eq!(vars, vec!["rho".to_string(), "T_custom".to_string()]);
        assert!(resolve_variables(&[Identifier::Code(999)]).is_err());
    }

    #[test]
    fn gdz_altitude_is_km_radius_systems_are_re() {
        assert_eq!(coord_units("GDZ", "sph")["c3"], "km");
        assert_eq!(coord_units("GEO", "sph")["c3"], "R_E");
        assert_eq!(coord_units("SM", "car")["c1"], "R_E");
        assert_eq!(coord_units("GDZ", "sph")["utc_time"], "s");
    }
}
