//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements       | Connects to                  |
//! |------------------|------------------|------------------------------|
//! | `config_file`    | ConfigPort       | JSON config on disk          |
//! | `i2c`            | BusOpener        | `/dev/i2c-N` (feature `rpi`) |
//! | `intents_file`   | IntentSource     | schedule's JSON intent file  |
//! | `log_sink`       | EventSink        | `log` facade / journald      |
//! | `radiator_store` | RadiatorStore    | JSON radiator table          |
//! | `serial`         | TelemetrySource  | meter UART or simulated meter|

pub mod config_file;
#[cfg(feature = "rpi")]
pub mod i2c;
pub mod intents_file;
pub mod log_sink;
pub mod radiator_store;
pub mod serial;

use std::io::Write;
use std::path::Path;

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)
}
