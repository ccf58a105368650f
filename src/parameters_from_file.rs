//! Supports reading the linkage geometry and controller settings from YAML file (optional)

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::Deserialize;
use serde_saphyr::Options;

use crate::buttons::Button;
use crate::parameter_error::ParameterError;
use crate::parameters::falcon_kinematics::{ControllerConfig, DriverConfig, GeometryConstants, SolverSettings};

#[derive(Deserialize)]
struct GeometryYaml {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    r: f64,
    s: f64,
    phy: [f64; 3],
}

#[derive(Deserialize)]
#[serde(default)]
struct SolverYaml {
    tolerance: f64,
    max_iterations: usize,
    initial_step: f64,
    min_determinant: f64,
}

impl Default for SolverYaml {
    fn default() -> Self {
        let defaults = SolverSettings::default();
        SolverYaml {
            tolerance: defaults.tolerance,
            max_iterations: defaults.max_iterations,
            initial_step: defaults.initial_step,
            min_determinant: defaults.min_determinant,
        }
    }
}

fn default_max_force() -> f64 { ControllerConfig::default().max_force }
fn default_initial_guess() -> [f64; 3] {
    let guess = ControllerConfig::default().initial_guess;
    [guess.x, guess.y, guess.z]
}

#[derive(Deserialize)]
struct ControllerYaml {
    #[serde(default)]
    solver: SolverYaml,
    #[serde(default = "default_initial_guess")]
    initial_guess: [f64; 3],
    #[serde(default = "default_max_force")]
    max_force: f64,
    /// Button name, e.g. `center`
    #[serde(default)]
    calibration_button: Option<String>,
}

impl Default for ControllerYaml {
    fn default() -> Self {
        ControllerYaml {
            solver: SolverYaml::default(),
            initial_guess: default_initial_guess(),
            max_force: default_max_force(),
            calibration_button: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct DriverYaml {
    period_ms: u64,
    max_consecutive_failures: u32,
}

impl Default for DriverYaml {
    fn default() -> Self {
        let defaults = DriverConfig::default();
        DriverYaml {
            period_ms: defaults.period_ms,
            max_consecutive_failures: defaults.max_consecutive_failures,
        }
    }
}

#[derive(Deserialize)]
struct SessionRoot {
    /// Optional here so that its absence is reported as a missing field
    #[serde(default)]
    falcon_geometry: Option<GeometryYaml>,
    #[serde(default)]
    controller: Option<ControllerYaml>,
    #[serde(default)]
    driver: Option<DriverYaml>,
}

#[derive(Deserialize)]
struct GeometryRoot {
    #[serde(default)]
    falcon_geometry: Option<GeometryYaml>,
}

/// Settings for a complete device session, as read from one YAML file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub geometry: GeometryConstants,
    pub controller: ControllerConfig,
    pub driver: DriverConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            geometry: GeometryConstants::novint_falcon(),
            controller: ControllerConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Read the session configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// falcon_geometry:
    ///   a: 0.060
    ///   b: 0.1025
    ///   c: 0.0157
    ///   d: 0.0115
    ///   e: 0.0262
    ///   f: 0.0270
    ///   r: 0.0363
    ///   s: 0.0363
    ///   phy: [0, deg(120), deg(240)]
    /// controller:
    ///   max_force: 5.0
    ///   calibration_button: center
    ///   initial_guess: [0.0, 0.0, 0.11]
    ///   solver:
    ///     tolerance: 0.01
    ///     max_iterations: 15
    ///     initial_step: 0.5
    /// driver:
    ///   period_ms: 10
    ///   max_consecutive_failures: 3
    /// ```
    /// Only `falcon_geometry` is mandatory; missing settings take their defaults.
    ///
    /// YAML extension to parse the deg(angle) function is supported (serde_saphyr).
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let root: SessionRoot = parse(contents)?;
        Ok(SessionConfig {
            geometry: geometry_from(root.falcon_geometry)?,
            controller: controller_from(root.controller.unwrap_or_default())?,
            driver: driver_from(root.driver.unwrap_or_default())?,
        })
    }
}

impl GeometryConstants {
    /// Read the linkage geometry from YAML file, see [`SessionConfig::from_yaml_file`] for the format.
    /// Other sections of the file are ignored.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let root: GeometryRoot = parse(contents)?;
        geometry_from(root.falcon_geometry)
    }
}

fn parse<T: serde::de::DeserializeOwned>(contents: &str) -> Result<T, ParameterError> {
    serde_saphyr::from_str_with_options(
        contents,
        Options { angle_conversions: true, ..Default::default() },
    ).map_err(|e| ParameterError::ParseError(format!("{}", e)))
}

fn geometry_from(section: Option<GeometryYaml>) -> Result<GeometryConstants, ParameterError> {
    let gp = section.ok_or_else(|| ParameterError::MissingField("falcon_geometry".to_string()))?;

    for (name, value) in [
        ("a", gp.a), ("b", gp.b), ("c", gp.c), ("d", gp.d),
        ("e", gp.e), ("f", gp.f), ("r", gp.r), ("s", gp.s),
    ] {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(ParameterError::InvalidValue {
                field: name.to_string(),
                reason: format!("length must be finite and not negative (got {})", value),
            });
        }
    }
    if gp.a == 0.0 || gp.b == 0.0 {
        return Err(ParameterError::InvalidValue {
            field: "a, b".to_string(),
            reason: "arm lengths must be positive".to_string(),
        });
    }
    if let Some(leg) = gp.phy.iter().position(|v| !v.is_finite()) {
        return Err(ParameterError::InvalidValue {
            field: format!("phy[{}]", leg),
            reason: "leg angle must be finite".to_string(),
        });
    }

    Ok(GeometryConstants {
        a: gp.a,
        b: gp.b,
        c: gp.c,
        d: gp.d,
        e: gp.e,
        f: gp.f,
        r: gp.r,
        s: gp.s,
        phy: gp.phy,
    })
}

fn controller_from(section: ControllerYaml) -> Result<ControllerConfig, ParameterError> {
    let solver = solver_from(section.solver)?;

    if !(section.max_force >= 0.0) {
        return Err(ParameterError::InvalidValue {
            field: "max_force".to_string(),
            reason: "must be zero or positive".to_string(),
        });
    }

    let calibration_button = match section.calibration_button {
        None => ControllerConfig::default().calibration_button,
        Some(name) => Button::from_name(&name).ok_or_else(|| ParameterError::InvalidValue {
            field: "calibration_button".to_string(),
            reason: format!("unknown button '{}'", name),
        })?,
    };

    let initial_guess = Vector3::from(section.initial_guess);
    if !initial_guess.iter().all(|v| v.is_finite()) {
        return Err(ParameterError::InvalidValue {
            field: "initial_guess".to_string(),
            reason: "must be finite".to_string(),
        });
    }

    Ok(ControllerConfig { solver, initial_guess, max_force: section.max_force, calibration_button })
}

fn solver_from(section: SolverYaml) -> Result<SolverSettings, ParameterError> {
    if !(section.tolerance > 0.0) || !(section.initial_step > 0.0) {
        return Err(ParameterError::InvalidValue {
            field: "solver".to_string(),
            reason: "tolerance and initial_step must be positive".to_string(),
        });
    }
    Ok(SolverSettings {
        tolerance: section.tolerance,
        max_iterations: section.max_iterations,
        initial_step: section.initial_step,
        min_determinant: section.min_determinant,
    })
}

fn driver_from(section: DriverYaml) -> Result<DriverConfig, ParameterError> {
    if section.max_consecutive_failures == 0 {
        return Err(ParameterError::InvalidValue {
            field: "max_consecutive_failures".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(DriverConfig {
        period_ms: section.period_ms,
        max_consecutive_failures: section.max_consecutive_failures,
    })
}
