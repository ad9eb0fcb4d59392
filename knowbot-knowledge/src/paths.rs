use std::path::PathBuf;

use crate::KnowledgeSettings;
use crate::errors::{KnowledgeError, KnowledgeResult};

pub const KNOWLEDGE_DB_FILE: &str = "knowledge.sqlite3";

pub fn data_root() -> KnowledgeResult<PathBuf> {
    if let Ok(override_dir) = std::env::var("KNOWBOT_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let dir = dirs::data_dir().ok_or(KnowledgeError::MissingDataDir)?;
    Ok(dir.join("knowbot"))
}

pub fn knowledge_db_path(settings: &KnowledgeSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.db_path_override {
        return Ok(path.clone());
    }
    Ok(data_root()?.join(KNOWLEDGE_DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        let settings = KnowledgeSettings {
            db_path_override: Some(PathBuf::from("/tmp/custom.sqlite3")),
            ..Default::default()
        };
        assert_eq!(
            knowledge_db_path(&settings).unwrap(),
            PathBuf::from("/tmp/custom.sqlite3")
        );
    }
}
