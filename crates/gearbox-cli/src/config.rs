//! Configuration Vault – reads/writes `~/.gearbox/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use gearbox_runtime::RobotConfig;
use gearbox_types::{GearboxError, HardwareMode};
use tracing::warn;

/// Overrides the hardware mode of every actuator.
pub const MODE_ENV: &str = "GEARBOX_MODE";
/// Overrides `loop_period_s`.
pub const LOOP_PERIOD_ENV: &str = "GEARBOX_LOOP_PERIOD_S";

/// Return the path to `~/.gearbox/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gearbox").join("config.toml")
}

/// Load the config at `path`.  Returns `None` if the file does not exist.
///
/// # Errors
///
/// Returns [`GearboxError::Configuration`] if the file cannot be read or
/// parsed, or the parsed configuration is invalid.
pub fn load_from(path: &Path) -> Result<Option<RobotConfig>, GearboxError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| GearboxError::Configuration(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: RobotConfig = toml::from_str(&raw)
        .map_err(|e| GearboxError::Configuration(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Load the config at `path`, falling back to the defaults (with
/// environment overrides) when the file is absent.
///
/// # Errors
///
/// Same as [`load_from`].
pub fn load_or_default(path: &Path) -> Result<RobotConfig, GearboxError> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = RobotConfig::default();
            apply_env_overrides(&mut cfg);
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

/// Apply `GEARBOX_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GEARBOX_MODE` | `mode` of every actuator (`real`, `sim`, `replay`) |
/// | `GEARBOX_LOOP_PERIOD_S` | `loop_period_s` |
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut RobotConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut RobotConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup(MODE_ENV) {
        match v.parse::<HardwareMode>() {
            Ok(mode) => cfg.set_mode(mode),
            Err(e) => warn!(variable = MODE_ENV, error = %e, "ignoring override"),
        }
    }
    if let Some(v) = lookup(LOOP_PERIOD_ENV) {
        match v.parse::<f64>() {
            Ok(period) if period > 0.0 => cfg.loop_period_s = period,
            _ => warn!(variable = LOOP_PERIOD_ENV, value = %v, "ignoring override"),
        }
    }
}

/// Save the config to `path`, creating its directory if necessary.
///
/// # Errors
///
/// Returns [`GearboxError::Configuration`] if the directory or file cannot
/// be written.
pub fn save_to(cfg: &RobotConfig, path: &Path) -> Result<(), GearboxError> {
    let io_err = |what: &str, e: std::io::Error| GearboxError::Configuration(format!("failed to {what}: {e}"));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("create config directory", e))?;
        // Owner only (rwx------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| io_err("set config directory permissions", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| GearboxError::Configuration(format!("failed to serialize config: {e}")))?;
    // Owner read/write only (rw-------).
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| io_err(&format!("write {}", path.display()), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| io_err(&format!("write {}", path.display()), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_types::ActuatorId;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&RobotConfig::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = RobotConfig::default();
        cfg.loop_period_s = 0.01;
        cfg.actuators.get_mut(&ActuatorId::Feeder).unwrap().tolerance = Some(0.5);
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.loop_period_s, 0.01);
        assert_eq!(loaded.actuator(ActuatorId::Feeder).tolerance, Some(0.5));
    }

    #[test]
    fn config_path_points_to_gearbox_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".gearbox"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "loop_period_s = \"fast\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(GearboxError::Configuration(_))));
    }

    #[test]
    fn invalid_range_in_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[actuators.flywheel]\nmin = 10.0\nmax = 5.0\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn mode_override_applies_to_every_actuator() {
        let mut cfg = RobotConfig::default();
        apply_overrides(&mut cfg, lookup(&[(MODE_ENV, "replay")]));
        assert!(ActuatorId::ALL.iter().all(|id| cfg.actuator(*id).mode == HardwareMode::Replay));
    }

    #[test]
    fn loop_period_override() {
        let mut cfg = RobotConfig::default();
        apply_overrides(&mut cfg, lookup(&[(LOOP_PERIOD_ENV, "0.005")]));
        assert_eq!(cfg.loop_period_s, 0.005);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut cfg = RobotConfig::default();
        let original = cfg.clone();
        apply_overrides(&mut cfg, lookup(&[(MODE_ENV, "hover"), (LOOP_PERIOD_ENV, "-1")]));
        assert_eq!(cfg, original);
    }
}
