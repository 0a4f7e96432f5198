//! Operator id → display name directory.

use crate::error::Result;
use crate::reader::detect_delimiter;
use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Prefix of the synthesized name used for operators missing from the directory.
pub const FALLBACK_NAME_PREFIX: &str = "REG_ANS_";

const BUILTIN_OPERATORS: [&str; 3] = ["316458", "421723", "344800"];

/// One row of an operator registry file.
#[derive(Debug, Deserialize)]
struct OperatorRecord {
    #[serde(rename = "Registro_ANS", alias = "REGISTRO_ANS", alias = "REG_ANS")]
    id: String,

    #[serde(
        rename = "Razao_Social",
        alias = "RAZAO_SOCIAL",
        alias = "RazaoSocial",
        alias = "NOME"
    )]
    name: String,
}

/// Immutable lookup from regulator-assigned operator id to display name.
#[derive(Debug, Clone, Default)]
pub struct OperatorDirectory {
    names: HashMap<String, String>,
}

impl OperatorDirectory {
    /// An empty directory; every lookup falls back to a synthesized name.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The static table shipped with the tool.
    pub fn builtin() -> Self {
        let names = BUILTIN_OPERATORS
            .iter()
            .map(|id| (id.to_string(), format!("Operadora {}", id)))
            .collect();
        OperatorDirectory { names }
    }

    /// Built-in table extended with the entries of an operator registry file.
    pub fn load(path: &Path) -> Result<Self> {
        let delimiter = detect_delimiter(BufReader::new(File::open(path)?))?;
        let mut directory = Self::builtin();
        let added = directory.extend_from_reader(BufReader::new(File::open(path)?), delimiter)?;
        info!(
            "Loaded {} operators from {}",
            added,
            path.display()
        );
        Ok(directory)
    }

    /// Adds every well-formed record; malformed ones are skipped.
    pub fn extend_from_reader<R: Read>(&mut self, reader: R, delimiter: u8) -> Result<usize> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut added = 0;
        for (row_idx, result) in csv_reader.deserialize::<OperatorRecord>().enumerate() {
            let row_num = row_idx + 2;
            match result {
                Ok(record) if !record.id.is_empty() && !record.name.is_empty() => {
                    self.names.insert(record.id, record.name);
                    added += 1;
                }
                Ok(_) => debug!("Operator row {}: blank id or name, skipping", row_num),
                Err(e) => warn!("Operator row {}: {}", row_num, e),
            }
        }

        Ok(added)
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id.trim()).map(String::as_str)
    }

    /// Display name for `id`, or `REG_ANS_<id>` when unknown.
    pub fn resolve(&self, id: &str) -> String {
        let id = id.trim();
        self.get(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", FALLBACK_NAME_PREFIX, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_builtin_table() {
        let directory = OperatorDirectory::builtin();
        assert_eq!(directory.resolve("316458"), "Operadora 316458");
        assert_eq!(directory.resolve(" 421723 "), "Operadora 421723");
        assert_eq!(directory.get("344800"), Some("Operadora 344800"));
    }

    #[test]
    fn test_unknown_operator_gets_synthesized_name() {
        let directory = OperatorDirectory::builtin();
        assert_eq!(directory.resolve("999999"), "REG_ANS_999999");
        assert_eq!(OperatorDirectory::empty().resolve(" 1 "), "REG_ANS_1");
    }

    #[test]
    fn test_extend_from_registry_file() {
        let csv = "Registro_ANS;CNPJ;Razao_Social;Modalidade\n\
                   419761;19541931000125;UNIMED CAMPINAS;Cooperativa\n\
                   ;1;SEM REGISTRO;x\n";

        let mut directory = OperatorDirectory::empty();
        let added = directory
            .extend_from_reader(Cursor::new(csv), b';')
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(directory.resolve("419761"), "UNIMED CAMPINAS");
    }

    #[test]
    fn test_extend_accepts_header_aliases() {
        let csv = "REG_ANS,NOME\n100,Operadora Alfa\n";
        let mut directory = OperatorDirectory::empty();
        directory
            .extend_from_reader(Cursor::new(csv), b',')
            .unwrap();
        assert_eq!(directory.get("100"), Some("Operadora Alfa"));
    }

    #[test]
    fn test_insert_overrides_builtin() {
        let mut directory = OperatorDirectory::builtin();
        directory.insert("316458", "Renamed");
        assert_eq!(directory.resolve("316458"), "Renamed");
    }
}
