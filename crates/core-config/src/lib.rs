//! Configuration loading and parsing.
//!
//! Parses `gridwin.toml` (or an override path provided by the binary) into a
//! [`ConfigFile`] and resolves it into the runtime [`GridSettings`] consumed by
//! the session: grid extent, cell geometry, buffer and recycle threshold,
//! scroll debounce timing and the data fetch mode.
//!
//! Every section and field is optional. Unknown fields are ignored (TOML
//! deserialization tolerance) and a missing or malformed file falls back to the
//! defaults. Values that would break the window arithmetic (zero cell sizes, an
//! empty grid) are clamped during [`Config::resolve`] and the clamp is logged
//! under the `config` target.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "gridwin.toml";

/// Full addressable logical grid size. Immutable once a session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridExtent {
    pub total_rows: usize,
    pub total_columns: usize,
}

impl GridExtent {
    pub const fn new(total_rows: usize, total_columns: usize) -> Self {
        Self {
            total_rows,
            total_columns,
        }
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        row < self.total_rows && column < self.total_columns
    }
}

/// Fixed cell geometry and window sizing constants.
///
/// `buffer_size` is the number of extra rows/columns materialized on each side
/// of the visible sliding window. `recycle_threshold` is the lead, in cells,
/// the window keeps ahead of the scroll position before it is shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cell_width: u32,
    pub cell_height: u32,
    pub buffer_size: usize,
    pub recycle_threshold: usize,
}

impl Geometry {
    /// Pixel offset of logical `(row, column)` inside its pane. x follows the
    /// column, y follows the row.
    pub fn pixel_position(&self, row: usize, column: usize) -> (u64, u64) {
        (
            u64::from(self.cell_width) * column as u64,
            u64::from(self.cell_height) * row as u64,
        )
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            cell_width: GeometrySection::default_cell_size(),
            cell_height: GeometrySection::default_cell_size(),
            buffer_size: WindowSection::default_buffer_size(),
            recycle_threshold: WindowSection::default_recycle_threshold(),
        }
    }
}

/// Debounce windows used by the scroll engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTiming {
    /// Quiet window after a recycle during which immediate recycles are skipped.
    pub burst_window: Duration,
    /// Delay of the trailing settle recycle after the last qualifying scroll.
    pub settle_delay: Duration,
}

impl Default for ScrollTiming {
    fn default() -> Self {
        Self {
            burst_window: Duration::from_millis(ScrollSection::default_burst_window_ms()),
            settle_delay: Duration::from_millis(ScrollSection::default_settle_delay_ms()),
        }
    }
}

/// How cache coverage is obtained from the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Fetch inline before any slot is bound; an uncovered read is fatal.
    #[default]
    Synchronous,
    /// Issue fetch tickets and bind placeholders until the fetch completes.
    Deferred,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GridSection {
    #[serde(default = "GridSection::default_total")]
    pub total_rows: usize,
    #[serde(default = "GridSection::default_total")]
    pub total_columns: usize,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            total_rows: Self::default_total(),
            total_columns: Self::default_total(),
        }
    }
}

impl GridSection {
    const fn default_total() -> usize {
        1000
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeometrySection {
    #[serde(default = "GeometrySection::default_cell_size")]
    pub cell_width: u32,
    #[serde(default = "GeometrySection::default_cell_size")]
    pub cell_height: u32,
}

impl Default for GeometrySection {
    fn default() -> Self {
        Self {
            cell_width: Self::default_cell_size(),
            cell_height: Self::default_cell_size(),
        }
    }
}

impl GeometrySection {
    const fn default_cell_size() -> u32 {
        60
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowSection {
    #[serde(default = "WindowSection::default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "WindowSection::default_recycle_threshold")]
    pub recycle_threshold: usize,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            buffer_size: Self::default_buffer_size(),
            recycle_threshold: Self::default_recycle_threshold(),
        }
    }
}

impl WindowSection {
    const fn default_buffer_size() -> usize {
        20
    }
    const fn default_recycle_threshold() -> usize {
        10
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrollSection {
    #[serde(default = "ScrollSection::default_burst_window_ms")]
    pub burst_window_ms: u64,
    #[serde(default = "ScrollSection::default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for ScrollSection {
    fn default() -> Self {
        Self {
            burst_window_ms: Self::default_burst_window_ms(),
            settle_delay_ms: Self::default_settle_delay_ms(),
        }
    }
}

impl ScrollSection {
    const fn default_burst_window_ms() -> u64 {
        100
    }
    const fn default_settle_delay_ms() -> u64 {
        50
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DataSection {
    #[serde(default)]
    pub fetch: FetchMode,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub geometry: GeometrySection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub scroll: ScrollSection,
    #[serde(default)]
    pub data: DataSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Command line overrides applied on top of the parsed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub total_rows: Option<usize>,
    pub total_columns: Option<usize>,
    pub fetch: Option<FetchMode>,
}

/// Fully resolved settings for one grid session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSettings {
    pub extent: GridExtent,
    pub geometry: Geometry,
    pub timing: ScrollTiming,
    pub fetch: FetchMode,
}

impl Default for GridSettings {
    fn default() -> Self {
        Config::default().resolve()
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    // Prefer a local `gridwin.toml` in the working directory before falling
    // back to the platform config dir.
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("gridwin").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                // Fall back to defaults rather than refusing to start.
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Apply command line overrides onto the parsed file values.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(rows) = overrides.total_rows {
            self.file.grid.total_rows = rows;
        }
        if let Some(columns) = overrides.total_columns {
            self.file.grid.total_columns = columns;
        }
        if let Some(fetch) = overrides.fetch {
            self.file.data.fetch = fetch;
        }
    }

    /// Resolve the file into runtime settings, clamping degenerate values.
    pub fn resolve(&self) -> GridSettings {
        let grid = &self.file.grid;
        let geometry = &self.file.geometry;
        let total_rows = clamp_min_one("total_rows", grid.total_rows);
        let total_columns = clamp_min_one("total_columns", grid.total_columns);
        let cell_width = clamp_min_one("cell_width", geometry.cell_width as usize) as u32;
        let cell_height = clamp_min_one("cell_height", geometry.cell_height as usize) as u32;

        GridSettings {
            extent: GridExtent::new(total_rows, total_columns),
            geometry: Geometry {
                cell_width,
                cell_height,
                buffer_size: self.file.window.buffer_size,
                recycle_threshold: self.file.window.recycle_threshold,
            },
            timing: ScrollTiming {
                burst_window: Duration::from_millis(self.file.scroll.burst_window_ms),
                settle_delay: Duration::from_millis(self.file.scroll.settle_delay_ms),
            },
            fetch: self.file.data.fetch,
        }
    }
}

fn clamp_min_one(field: &'static str, raw: usize) -> usize {
    if raw == 0 {
        info!(target: "config", field, raw, clamped = 1, "config_value_clamped");
        1
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        let settings = cfg.resolve();
        assert_eq!(settings.extent, GridExtent::new(1000, 1000));
        assert_eq!(settings.geometry, Geometry::default());
        assert_eq!(settings.timing.burst_window, Duration::from_millis(100));
        assert_eq!(settings.timing.settle_delay, Duration::from_millis(50));
        assert_eq!(settings.fetch, FetchMode::Synchronous);
    }

    #[test]
    fn parses_all_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[grid]\ntotal_rows = 5000000\ntotal_columns = 200\n\
             [geometry]\ncell_width = 80\ncell_height = 24\n\
             [window]\nbuffer_size = 8\nrecycle_threshold = 4\n\
             [scroll]\nburst_window_ms = 120\nsettle_delay_ms = 30\n\
             [data]\nfetch = \"deferred\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_some());
        let settings = cfg.resolve();
        assert_eq!(settings.extent, GridExtent::new(5_000_000, 200));
        assert_eq!(settings.geometry.cell_width, 80);
        assert_eq!(settings.geometry.cell_height, 24);
        assert_eq!(settings.geometry.buffer_size, 8);
        assert_eq!(settings.geometry.recycle_threshold, 4);
        assert_eq!(settings.timing.burst_window, Duration::from_millis(120));
        assert_eq!(settings.timing.settle_delay, Duration::from_millis(30));
        assert_eq!(settings.fetch, FetchMode::Deferred);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[window]\nbuffer_size = 3\n").unwrap();
        let settings = load_from(Some(tmp.path().to_path_buf()))
            .unwrap()
            .resolve();
        assert_eq!(settings.geometry.buffer_size, 3);
        assert_eq!(settings.geometry.recycle_threshold, 10);
        assert_eq!(settings.geometry.cell_width, 60);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[grid\ntotal_rows = ").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.resolve(), GridSettings::default());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = Config::default();
        cfg.apply_overrides(ConfigOverrides {
            total_rows: Some(42),
            total_columns: None,
            fetch: Some(FetchMode::Deferred),
        });
        let settings = cfg.resolve();
        assert_eq!(settings.extent, GridExtent::new(42, 1000));
        assert_eq!(settings.fetch, FetchMode::Deferred);
    }

    #[test]
    fn pixel_position_maps_column_to_x_and_row_to_y() {
        let g = Geometry {
            cell_width: 60,
            cell_height: 20,
            buffer_size: 0,
            recycle_threshold: 0,
        };
        assert_eq!(g.pixel_position(3, 2), (120, 60));
    }

    #[test]
    fn zero_values_clamp_and_log_under_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[geometry]\ncell_width = 0\n[grid]\ntotal_rows = 0\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let settings = with_default(subscriber, || cfg.resolve());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("config_value_clamped"));
        assert_eq!(settings.geometry.cell_width, 1);
        assert_eq!(settings.extent.total_rows, 1);
    }
}
