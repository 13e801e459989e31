//! Test fixtures for layerpull: layer tarballs, fetched-image layouts, a
//! stand-in fetch tool and tree snapshots.

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

// ============================================================================
// Tree snapshots
// ============================================================================

/// One entry of a [`snapshot_tree`] result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Dir,
    File(Vec<u8>),
    Symlink(PathBuf),
}

/// Every entry under `root` (root excluded), keyed by relative path.
pub fn snapshot_tree(root: &Path) -> BTreeMap<PathBuf, TreeEntry> {
    let mut tree = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.expect("walk snapshot tree");
        let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let file_type = entry.file_type();
        let value = if file_type.is_symlink() {
            TreeEntry::Symlink(fs::read_link(entry.path()).unwrap())
        } else if file_type.is_dir() {
            TreeEntry::Dir
        } else {
            TreeEntry::File(fs::read(entry.path()).unwrap())
        };
        tree.insert(rel, value);
    }
    tree
}

// ============================================================================
// Layer tarballs
// ============================================================================

enum LayerEntry {
    Dir(String),
    File(String, Vec<u8>),
    Symlink(String, String),
}

/// Builds one layer tarball.
///
/// ```ignore
/// let layer = LayerBuilder::new()
///     .file("etc/os-release", "ID=fedora\n")
///     .whiteout("etc/motd")
///     .gzip();
/// ```
#[derive(Default)]
pub struct LayerBuilder {
    entries: Vec<LayerEntry>,
    gzip: bool,
}

impl LayerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(LayerEntry::Dir(path.to_string()));
        self
    }

    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.entries
            .push(LayerEntry::File(path.to_string(), content.as_ref().to_vec()));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries
            .push(LayerEntry::Symlink(path.to_string(), target.to_string()));
        self
    }

    /// Add a `.wh.<name>` marker deleting `path` from lower layers.
    pub fn whiteout(self, path: &str) -> Self {
        let path = Path::new(path);
        let name = path.file_name().unwrap().to_string_lossy();
        let marker = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("{}/.wh.{}", parent.display(), name)
            }
            _ => format!(".wh.{}", name),
        };
        self.file(&marker, b"")
    }

    /// Compress the tarball with gzip, as registries usually serve layers.
    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        for entry in &self.entries {
            let mut header = tar::Header::new_gnu();
            match entry {
                LayerEntry::Dir(path) => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_mode(0o755);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append_data(&mut header, path, &[][..]).unwrap();
                }
                LayerEntry::File(path, content) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_mode(0o644);
                    header.set_size(content.len() as u64);
                    header.set_cksum();
                    builder.append_data(&mut header, path, &content[..]).unwrap();
                }
                LayerEntry::Symlink(path, target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_mode(0o777);
                    header.set_size(0);
                    builder.append_link(&mut header, path, target).unwrap();
                }
            }
        }

        let tarball = builder.into_inner().unwrap();
        if !self.gzip {
            return tarball;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tarball).unwrap();
        encoder.finish().unwrap()
    }
}

// ============================================================================
// Fetched-image layouts
// ============================================================================

/// `sha256:<hex>` of `bytes`.
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// A `dir:` image layout (manifest.json + blobs), as the fetch tool would
/// leave it, plus scratch space for destinations.
pub struct ImageFixture {
    root: TempDir,
    layers: Vec<String>,
}

impl ImageFixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("layout")).unwrap();
        Self {
            root,
            layers: Vec::new(),
        }
    }

    /// Directory holding manifest.json and the blobs.
    pub fn layout_dir(&self) -> PathBuf {
        self.root.path().join("layout")
    }

    /// A fresh, not yet existing destination path under the fixture root.
    pub fn destination(&self, name: &str) -> PathBuf {
        self.root.path().join("dest").join(name)
    }

    /// Add a layer; its blob is stored under its digest's hex part.
    pub fn layer(mut self, layer: LayerBuilder) -> Self {
        let bytes = layer.build();
        let digest = sha256_digest(&bytes);
        self.write_blob(&digest, &bytes);
        self.layers.push(digest);
        self.write_manifest();
        self
    }

    /// Add a layer whose blob is arbitrary bytes (e.g. a corrupt archive).
    pub fn raw_layer(mut self, bytes: &[u8]) -> Self {
        let digest = sha256_digest(bytes);
        self.write_blob(&digest, bytes);
        self.layers.push(digest);
        self.write_manifest();
        self
    }

    /// Reference a layer whose blob was never downloaded.
    pub fn missing_layer(mut self, digest: &str) -> Self {
        self.layers.push(digest.to_string());
        self.write_manifest();
        self
    }

    /// Overwrite manifest.json with arbitrary content.
    pub fn manifest_raw(self, content: &str) -> Self {
        fs::write(self.layout_dir().join("manifest.json"), content).unwrap();
        self
    }

    pub fn digests(&self) -> &[String] {
        &self.layers
    }

    /// Write a stand-in for the fetch tool that copies this layout.
    pub fn fetch_tool(&self) -> FakeFetchTool {
        FakeFetchTool::write(self.root.path(), Some(&self.layout_dir()), None)
    }

    /// Write a stand-in for the fetch tool that always fails with `message`.
    pub fn failing_fetch_tool(&self, message: &str) -> FakeFetchTool {
        FakeFetchTool::write(self.root.path(), None, Some(message))
    }

    fn write_blob(&self, digest: &str, bytes: &[u8]) {
        let name = digest.split_once(':').map(|(_, hex)| hex).unwrap_or(digest);
        fs::write(self.layout_dir().join(name), bytes).unwrap();
    }

    fn write_manifest(&self) {
        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "layers": self
                .layers
                .iter()
                .map(|digest| serde_json::json!({
                    "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                    "digest": digest,
                }))
                .collect::<Vec<_>>(),
        });
        fs::write(
            self.layout_dir().join("manifest.json"),
            serde_json::to_vec_pretty(&manifest).unwrap(),
        )
        .unwrap();
    }
}

impl Default for ImageFixture {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fake fetch tool
// ============================================================================

/// Shell script accepting `copy <src> dir:<dest> [--src-creds=..]`.
///
/// It copies a fixture layout into `<dest>` (or fails) and records its
/// arguments, one per line, for later inspection.
pub struct FakeFetchTool {
    path: PathBuf,
    args_log: PathBuf,
}

impl FakeFetchTool {
    fn write(dir: &Path, layout: Option<&Path>, failure: Option<&str>) -> Self {
        let path = dir.join("fake-skopeo");
        let args_log = dir.join("fake-skopeo.args");

        let body = match (layout, failure) {
            (_, Some(message)) => format!("echo '{}' >&2\nexit 1\n", message.replace('\'', "")),
            (Some(layout), None) => format!(
                "dest=\"${{3#dir:}}\"\nmkdir -p \"$dest\"\ncp -R '{}/.' \"$dest/\"\n",
                layout.display()
            ),
            (None, None) => "exit 0\n".to_string(),
        };
        let script = format!(
            "#!/bin/sh\nset -e\nprintf '%s\\n' \"$@\" > '{}'\n\
             if [ \"$1\" != copy ]; then echo \"unexpected subcommand: $1\" >&2; exit 64; fi\n{}",
            args_log.display(),
            body
        );

        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Self { path, args_log }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments of the last invocation, or empty if it never ran.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(&self.args_log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
