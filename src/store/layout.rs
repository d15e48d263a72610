use std::path::{Path, PathBuf};

use uuid::Uuid;

const PROCESSED_DIR_NAME: &str = "processed";
const OUTPUT_DIR_NAME: &str = "output";
const RESULTS_DIR_NAME: &str = "results";

/// Where the three artifacts of a detection live, all keyed by its id.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    image_url_prefix: String,
}

impl ArtifactLayout {
    pub fn new<P: AsRef<Path>>(root: P, image_url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            image_url_prefix: image_url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR_NAME)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR_NAME)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR_NAME)
    }

    pub fn normalized_path(&self, id: Uuid) -> PathBuf {
        self.processed_dir().join(format!("{}_preprocessed.png", id))
    }

    pub fn annotated_file_name(&self, id: Uuid) -> String {
        format!("{}_detected.jpg", id)
    }

    pub fn annotated_path(&self, id: Uuid) -> PathBuf {
        self.output_dir().join(self.annotated_file_name(id))
    }

    pub fn record_path(&self, id: Uuid) -> PathBuf {
        self.results_dir().join(format!("{}.json", id))
    }

    /// Reference the HTTP layer serves the annotated image under.
    pub fn image_url(&self, id: Uuid) -> String {
        format!(
            "{}/{}",
            self.image_url_prefix.trim_end_matches('/'),
            self.annotated_file_name(id)
        )
    }
}

/// Sibling path a file is written to before being renamed over `path`.
/// Dot-prefixed so directory scans can skip it.
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_the_id() {
        let layout = ArtifactLayout::new("/data", "/api/floorplan/images/");
        let id = Uuid::new_v4();

        assert_eq!(
            layout.normalized_path(id),
            PathBuf::from(format!("/data/processed/{}_preprocessed.png", id))
        );
        assert_eq!(
            layout.annotated_path(id),
            PathBuf::from(format!("/data/output/{}_detected.jpg", id))
        );
        assert_eq!(
            layout.record_path(id),
            PathBuf::from(format!("/data/results/{}.json", id))
        );
        assert_eq!(
            layout.image_url(id),
            format!("/api/floorplan/images/{}_detected.jpg", id)
        );
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staged = staging_path(Path::new("/data/results/abc.json"));
        assert_eq!(staged, PathBuf::from("/data/results/.abc.json.tmp"));
    }
}
