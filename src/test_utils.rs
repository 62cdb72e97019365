/*
 * Test utilities and helpers for Pifan
 *
 * Shared fixtures for the unit test modules: temporary config documents and
 * fake thermal-zone files.
 */

#[cfg(test)]
pub mod test_utils {
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes `json` to `<tempdir>/config.json`. Keep the TempDir alive for
    /// as long as the path is used.
    pub fn write_temp_config(json: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        (dir, path)
    }

    /// Writes `content` to a fake `thermal_zone0/temp` file
    pub fn write_sensor_file(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let zone = dir.path().join("thermal_zone0");
        fs::create_dir_all(&zone).unwrap();
        let path = zone.join("temp");
        fs::write(&path, content).unwrap();
        (dir, path)
    }
}
