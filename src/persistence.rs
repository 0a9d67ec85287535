//! §6 External Interfaces — the `PersistenceStore` collaborator and its
//! filesystem default implementation, laid out under `<workspace>/.astra/`
//! exactly as §6 describes. §9.4 of SPEC_FULL.md.

use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::code_index::CodeIndex;
use crate::error::AstraError;
use crate::inverted_summary::InvertedSummaryIndex;
use crate::trigram_index::TrigramIndex;
use crate::vector_index::{Chunk, EmbeddingModel, VectorIndex};

/// Magic bytes identifying LZ4-compressed index files (teacher's
/// `index.rs::LZ4_MAGIC`, kept verbatim as an on-disk format constant).
pub const LZ4_MAGIC: &[u8; 4] = b"LZ4S";

/// §6's `PersistenceStore` interface. Spec §1 lists this among the external
/// collaborators the core is invoked through; `FsPersistenceStore` is the
/// minimal default that makes the crate runnable standalone.
pub trait PersistenceStore: Send + Sync {
    fn save_code_index(&self, index: &CodeIndex) -> Result<(), AstraError>;
    fn restore_code_index(&self) -> Result<CodeIndex, AstraError>;

    fn save_trigram_index(&self, index: &TrigramIndex) -> Result<(), AstraError>;
    fn restore_trigram_index(&self) -> Result<TrigramIndex, AstraError>;

    fn save_vector_index(&self, index: &VectorIndex) -> Result<(), AstraError>;
    fn restore_vector_index(&self) -> Result<VectorIndex, AstraError>;

    fn save_inverted_summary_index(&self, index: &InvertedSummaryIndex) -> Result<(), AstraError>;
    fn restore_inverted_summary_index(&self) -> Result<InvertedSummaryIndex, AstraError>;

    fn save_context_file(&self, name: &str, content: &str) -> Result<(), AstraError>;
    fn list_context_files(&self) -> Result<Vec<String>, AstraError>;
}

/// §6 vector metadata file shape: `{version, model, dimensions, chunkCount,
/// lastUpdated, chunks:[{id,file,fileName,startLine,endLine,type,symbolName,textLength}]}`.
/// Chunk *text* is intentionally not stored (§4.5); it's reloaded on demand.
#[derive(Debug, Serialize, Deserialize)]
struct VectorMetadata {
    version: u32,
    model: String,
    dimensions: usize,
    chunk_count: usize,
    last_updated: u64,
    chunks: Vec<ChunkMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkMetadata {
    id: String,
    file: String,
    file_name: String,
    start_line: u32,
    end_line: u32,
    #[serde(rename = "type")]
    chunk_type: String,
    symbol_name: Option<String>,
    text_length: usize,
}

/// Filesystem-backed `PersistenceStore` rooted at `<workspace>/.astra/`.
pub struct FsPersistenceStore {
    root: PathBuf,
}

impl FsPersistenceStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self { root: workspace_root.into().join(".astra") }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn code_index_dir(&self) -> PathBuf {
        self.root.join("code-index")
    }

    fn vectors_dir(&self) -> PathBuf {
        self.root.join("vectors")
    }

    fn trigram_path(&self) -> PathBuf {
        self.root.join("code-index").join("trigram.bin")
    }

    fn inverted_path(&self) -> PathBuf {
        self.root.join("code-index").join("inverted-summary.bin")
    }

    fn context_files_dir(&self) -> PathBuf {
        self.root.join("context-files")
    }

    /// Generated documentation filenames follow
    /// `<projectName>-documentation-<UTC-timestamp>.md` (§6); anything older
    /// than 4 hours is pruned when a new doc run starts.
    pub fn prune_stale_generated_docs(&self, project_name: &str, now_unix: u64) -> usize {
        let dir = &self.root;
        let Ok(entries) = std::fs::read_dir(dir) else { return 0 };
        let mut removed = 0;
        let pattern = format!("{}-documentation-", project_name);
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if !name.contains("-documentation-") && !name.starts_with(&pattern) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if let Ok(modified) = meta.modified() {
                    let age = now_unix.saturating_sub(
                        modified.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(now_unix),
                    );
                    if age > 4 * 3600 {
                        if std::fs::remove_file(entry.path()).is_ok() {
                            removed += 1;
                        }
                    }
                }
            }
        }
        removed
    }
}

/// Teacher's `save_compressed`: LZ4-framed bincode with a magic-byte header.
pub fn save_compressed<T: Serialize>(path: &Path, data: &T) -> Result<(), AstraError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let start = Instant::now();
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(LZ4_MAGIC)?;
    let mut encoder = lz4_flex::frame::FrameEncoder::new(writer);
    bincode::serialize_into(&mut encoder, data)?;
    let mut writer = encoder.finish().map_err(|e| AstraError::SaveFailed { kind: "compressed".to_string(), message: e.to_string() })?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), elapsed_ms = start.elapsed().as_millis(), "saved compressed index");
    Ok(())
}

/// Teacher's `load_compressed`, generalized to `AstraError`. Supports both
/// LZ4-framed and legacy uncompressed bincode for forward compatibility.
pub fn load_compressed<T: serde::de::DeserializeOwned>(path: &Path, kind: &str) -> Result<T, AstraError> {
    let path_str = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| AstraError::IndexLoad {
        kind: kind.to_string(),
        path: path_str.clone(),
        message: format!("cannot open file: {e}"),
    })?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|e| AstraError::IndexLoad {
        kind: kind.to_string(),
        path: path_str.clone(),
        message: format!("read error (magic bytes): {e}"),
    })?;

    if &magic == LZ4_MAGIC {
        let decoder = lz4_flex::frame::FrameDecoder::new(reader);
        bincode::deserialize_from(decoder).map_err(|e| AstraError::IndexLoad {
            kind: kind.to_string(),
            path: path_str,
            message: format!("LZ4 deserialization failed: {e}"),
        })
    } else {
        reader.seek(SeekFrom::Start(0)).map_err(AstraError::Io)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(AstraError::Io)?;
        bincode::deserialize(&buf).map_err(|e| AstraError::IndexLoad {
            kind: kind.to_string(),
            path: path_str,
            message: format!("deserialization failed: {e}"),
        })
    }
}

impl PersistenceStore for FsPersistenceStore {
    fn save_code_index(&self, index: &CodeIndex) -> Result<(), AstraError> {
        save_compressed(&self.code_index_dir().join("snapshot.bin"), index)
    }

    fn restore_code_index(&self) -> Result<CodeIndex, AstraError> {
        load_compressed(&self.code_index_dir().join("snapshot.bin"), "code-index")
    }

    fn save_trigram_index(&self, index: &TrigramIndex) -> Result<(), AstraError> {
        save_compressed(&self.trigram_path(), index)
    }

    fn restore_trigram_index(&self) -> Result<TrigramIndex, AstraError> {
        load_compressed(&self.trigram_path(), "trigram")
    }

    fn save_inverted_summary_index(&self, index: &InvertedSummaryIndex) -> Result<(), AstraError> {
        save_compressed(&self.inverted_path(), index)
    }

    fn restore_inverted_summary_index(&self) -> Result<InvertedSummaryIndex, AstraError> {
        load_compressed(&self.inverted_path(), "inverted-summary")
    }

    /// §6: metadata JSON + a flat little-endian `Float32Array` binary.
    /// Chunk text is not persisted (reloaded from file content on demand).
    fn save_vector_index(&self, index: &VectorIndex) -> Result<(), AstraError> {
        let dir = self.vectors_dir();
        std::fs::create_dir_all(&dir)?;

        let metadata = VectorMetadata {
            version: 1,
            model: match index.model {
                Some(EmbeddingModel::Tfidf) => "tfidf".to_string(),
                Some(EmbeddingModel::Hash) => "hash".to_string(),
                None => "hash".to_string(),
            },
            dimensions: index.dim,
            chunk_count: index.chunks.len(),
            last_updated: index.last_updated,
            chunks: index
                .chunks
                .iter()
                .map(|c| ChunkMetadata {
                    id: c.id.clone(),
                    file: c.file.clone(),
                    file_name: c.file_name.clone(),
                    start_line: c.start_line,
                    end_line: c.end_line,
                    chunk_type: format!("{:?}", c.chunk_type).to_lowercase(),
                    symbol_name: c.symbol_name.clone(),
                    text_length: c.text.len(),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&metadata)?;
        std::fs::write(dir.join("index.json"), json)?;

        let mut bytes = Vec::with_capacity(index.embeddings.len() * 4);
        for value in &index.embeddings {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(dir.join("embeddings.bin"), bytes)?;
        Ok(())
    }

    /// Restores metadata and embeddings; chunk `text` fields come back
    /// empty (§4.5's documented "not stored" contract) and must be
    /// rehydrated by the caller from file content.
    fn restore_vector_index(&self) -> Result<VectorIndex, AstraError> {
        let dir = self.vectors_dir();
        let meta_path = dir.join("index.json");
        let json = std::fs::read(&meta_path).map_err(|e| AstraError::IndexLoad {
            kind: "vector".to_string(),
            path: meta_path.display().to_string(),
            message: e.to_string(),
        })?;
        let metadata: VectorMetadata = serde_json::from_slice(&json)?;

        let bin_path = dir.join("embeddings.bin");
        let raw = std::fs::read(&bin_path).map_err(|e| AstraError::IndexLoad {
            kind: "vector".to_string(),
            path: bin_path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut embeddings = Vec::with_capacity(raw.len() / 4);
        for chunk in raw.chunks_exact(4) {
            embeddings.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        let chunks = metadata
            .chunks
            .into_iter()
            .map(|m| Chunk {
                id: m.id,
                text: String::new(),
                file: m.file,
                file_name: m.file_name,
                start_line: m.start_line,
                end_line: m.end_line,
                chunk_type: parse_chunk_type(&m.chunk_type),
                symbol_name: m.symbol_name,
            })
            .collect();

        Ok(VectorIndex {
            chunks,
            embeddings,
            dim: metadata.dimensions,
            model: match metadata.model.as_str() {
                "tfidf" => Some(EmbeddingModel::Tfidf),
                _ => Some(EmbeddingModel::Hash),
            },
            last_updated: metadata.last_updated,
        })
    }

    fn save_context_file(&self, name: &str, content: &str) -> Result<(), AstraError> {
        let dir = self.context_files_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(name), content)?;
        Ok(())
    }

    fn list_context_files(&self) -> Result<Vec<String>, AstraError> {
        let dir = self.context_files_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn parse_chunk_type(s: &str) -> crate::vector_index::ChunkType {
    use crate::vector_index::ChunkType::*;
    match s {
        "function" => Function,
        "class" => Class,
        "method" => Method,
        "struct" => Struct,
        "header" => Header,
        _ => Block,
    }
}

/// §10 supplemented feature: scan all four persisted index kinds and remove
/// ones whose workspace root no longer exists. Generalizes the teacher's
/// `cleanup_orphaned_indexes` (which only covered the file/content index)
/// to the full astra persistence layout.
pub fn cleanup_orphaned_indexes(index_roots: &[(PathBuf, PathBuf)]) -> usize {
    let mut removed = 0;
    for (workspace_root, astra_dir) in index_roots {
        if !workspace_root.exists() && astra_dir.exists() {
            if std::fs::remove_dir_all(astra_dir).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_restore_code_index_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path());
        let files = vec![crate::code_index::ContextFile {
            path: "a.rs".to_string(),
            content: "fn run() {\n  helper();\n}\n".to_string(),
            language: crate::language::Language::Rust,
        }];
        let mut index = CodeIndex::new();
        index.build_sync(&files, crate::code_index::BuildOptions::default());

        store.save_code_index(&index).unwrap();
        let restored = store.restore_code_index().unwrap();
        assert_eq!(restored.symbols().len(), index.symbols().len());
        assert_eq!(restored.call_graph().len(), index.call_graph().len());
        restored.check_invariants().unwrap();
    }

    #[test]
    fn save_restore_trigram_index_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path());
        let mut index = TrigramIndex::new();
        index.index_file("a.rs", "fn helper() {}\n");
        store.save_trigram_index(&index).unwrap();
        let restored = store.restore_trigram_index().unwrap();
        assert_eq!(restored.len(), index.len());
    }

    #[test]
    fn save_restore_vector_index_preserves_metadata_not_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path());
        let mut index = VectorIndex::new();
        index.add_chunks(
            vec![crate::vector_index::Chunk {
                id: "a.rs:run:1".to_string(),
                text: "fn run() { helper(); }".to_string(),
                file: "a.rs".to_string(),
                file_name: "a.rs".to_string(),
                start_line: 1,
                end_line: 1,
                chunk_type: crate::vector_index::ChunkType::Function,
                symbol_name: Some("run".to_string()),
            }],
            None,
        );
        store.save_vector_index(&index).unwrap();
        let restored = store.restore_vector_index().unwrap();
        assert_eq!(restored.chunks.len(), 1);
        assert_eq!(restored.chunks[0].text, "");
        assert_eq!(restored.embeddings.len(), index.embeddings.len());
    }

    #[test]
    fn restore_missing_index_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path());
        assert!(store.restore_code_index().is_err());
    }

    #[test]
    fn context_files_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path());
        store.save_context_file("a.rs", "fn main() {}").unwrap();
        store.save_context_file("b.rs", "fn helper() {}").unwrap();
        let files = store.list_context_files().unwrap();
        assert_eq!(files, vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn prune_stale_docs_removes_old_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPersistenceStore::new(dir.path().join("missing-parent").as_path());
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.root().join("proj-documentation-2020.md"), "old").unwrap();
        let now = now_unix_plus_hours(5);
        let removed = store.prune_stale_generated_docs("proj", now);
        assert_eq!(removed, 1);
    }

    fn now_unix_plus_hours(hours: u64) -> u64 {
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() + hours * 3600
    }

    #[test]
    fn cleanup_orphaned_indexes_removes_missing_roots() {
        let dir = tempfile::tempdir().unwrap();
        let astra_dir = dir.path().join("gone").join(".astra");
        std::fs::create_dir_all(&astra_dir).unwrap();
        let removed = cleanup_orphaned_indexes(&[(dir.path().join("gone").join("workspace-does-not-exist"), astra_dir.clone())]);
        assert_eq!(removed, 1);
        assert!(!astra_dir.exists());
    }
}
