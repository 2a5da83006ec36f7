//! Default output names for captures the operator did not name.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of generated capture names
pub const CAPTURE_PREFIX: &str = "received_";

/// Extension of generated capture names
pub const CAPTURE_EXTENSION: &str = "dat";

/// `received_YYYYMMDD_HHMMSS.dat` for the given instant.
pub fn default_capture_name<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{CAPTURE_PREFIX}{}.{CAPTURE_EXTENSION}",
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Default capture name for `at`, placed in `dir`.
pub fn default_capture_path<Tz>(dir: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dir.join(default_capture_name(at))
}

/// Default capture path for the current local time in the working directory.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined.
pub fn default_capture_path_now() -> io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(default_capture_path(&cwd, &Local::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_name_encodes_date_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(default_capture_name(&at), "received_20240305_140709.dat");
    }

    #[test]
    fn test_path_is_inside_directory() {
        let at = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        let path = default_capture_path(Path::new("/captures"), &at);
        assert_eq!(path, PathBuf::from("/captures/received_19991231_235959.dat"));
    }

    #[test]
    fn test_now_resolves_in_working_directory() {
        let path = default_capture_path_now().unwrap();
        assert_eq!(path.parent(), Some(std::env::current_dir().unwrap().as_path()));

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(CAPTURE_PREFIX));
        assert!(name.ends_with(".dat"));
        // received_ + YYYYMMDD_HHMMSS + .dat
        assert_eq!(name.len(), CAPTURE_PREFIX.len() + 15 + 4);
    }
}
