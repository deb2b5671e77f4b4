use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flight track written into every new operation that is created without
/// explicit content.
pub const STUB_CODE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FlightTrack version="1.7.6">
  <ListOfWaypoints>
    <Waypoint flightlevel="0.0" lat="55.15" location="B" lon="-23.74">
      <Comments>Takeoff</Comments>
    </Waypoint>
    <Waypoint flightlevel="350" lat="42.99" location="A" lon="-12.1">
      <Comments></Comments>
    </Waypoint>
    <Waypoint flightlevel="380" lat="52.785" location="Delhi" lon="-2.545">
      <Comments></Comments>
    </Waypoint>
    <Waypoint flightlevel="400" lat="48.08" location="" lon="10.83">
      <Comments></Comments>
    </Waypoint>
  </ListOfWaypoints>
</FlightTrack>
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Database file name, relative to `data_dir` unless absolute.
    pub db_file: PathBuf,
    /// Operations unused for more than this many days are archived when
    /// their members list them.
    pub archive_threshold_days: i64,
    /// Path suffix that marks an operation as a category template.
    pub group_postfix: String,
    pub stub_code: String,
}

impl Settings {
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads settings from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_postfix.is_empty() {
            return Err(Error::Config("group_postfix cannot be empty".to_string()));
        }
        if self.archive_threshold_days < 0 {
            return Err(Error::Config(
                "archive_threshold_days cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_file: PathBuf::from("mscolab.db"),
            archive_threshold_days: 30,
            group_postfix: "Group".to_string(),
            stub_code: STUB_CODE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::with_data_dir("/srv/mscolab");
        assert_eq!(settings.db_path(), PathBuf::from("/srv/mscolab/mscolab.db"));
        assert_eq!(settings.group_postfix, "Group");
        assert_eq!(settings.archive_threshold_days, 30);
        assert!(settings.stub_code.contains("<FlightTrack"));
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mscolab.toml");
        fs::write(&path, "archive_threshold_days = 7\ngroup_postfix = \"Team\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.archive_threshold_days, 7);
        assert_eq!(settings.group_postfix, "Team");
        assert_eq!(settings.db_file, PathBuf::from("mscolab.db"));
    }

    #[test]
    fn test_load_rejects_empty_postfix() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mscolab.toml");
        fs::write(&path, "group_postfix = \"\"\n").unwrap();

        assert!(matches!(Settings::load(&path), Err(Error::Config(_))));
    }
}
