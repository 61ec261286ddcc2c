use ocmonitor_types::PriceFields;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Model key (`provider/model` or bare `model`) to raw fields
pub type PriceTable = BTreeMap<String, PriceFields>;

/// Read a `models.json` price file.
///
/// A missing file is an empty tier. An unreadable or malformed file is logged
/// and also treated as empty.
pub fn load_price_file(path: &Path) -> PriceTable {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return PriceTable::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read price file, ignoring");
            return PriceTable::new();
        }
    };

    match serde_json::from_str::<PriceTable>(&content) {
        Ok(table) => {
            tracing::debug!(path = %path.display(), models = table.len(), "loaded price file");
            table
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed price file, ignoring");
            PriceTable::new()
        }
    }
}
