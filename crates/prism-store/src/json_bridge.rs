use std::fs;
use std::path::Path;

use prism_core::{export_sessions_json, import_channel_json, import_sessions_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import one export or an array of exports from a JSON file.
    /// Returns how many sessions were saved.
    pub fn import_sessions_file(&self, path: &Path) -> Result<usize> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        self.import_sessions_str(&json)
    }

    /// All sessions land in one transaction: a failure part way through
    /// leaves the store as it was.
    pub fn import_sessions_str(&self, json: &str) -> Result<usize> {
        let exports = import_sessions_json(json)
            .map_err(|e| StoreError::InvalidData(format!("invalid session JSON: {e}")))?;
        let tx = self.conn().unchecked_transaction()?;
        for export in &exports {
            Self::insert_session(&tx, export)?;
        }
        tx.commit()?;
        Ok(exports.len())
    }

    /// Import channel payloads (`{"channel": .., "data": ..}`, single or array).
    pub fn import_channel_file(&self, path: &Path) -> Result<usize> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        self.import_channel_str(&json)
    }

    pub fn import_channel_str(&self, json: &str) -> Result<usize> {
        let payloads = import_channel_json(json)
            .map_err(|e| StoreError::InvalidData(format!("invalid channel JSON: {e}")))?;
        for payload in &payloads {
            self.put_channel_data(payload)?;
        }
        Ok(payloads.len())
    }

    /// Every stored session as a JSON array.
    pub fn export_sessions_json_string(&self) -> Result<String> {
        let exports = self.load_sessions()?;
        export_sessions_json(&exports)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }

    pub fn export_sessions_file(&self, path: &Path) -> Result<()> {
        let json = self.export_sessions_json_string()?;
        fs::write(path, json).map_err(|e| StoreError::io(path, e))
    }
}
