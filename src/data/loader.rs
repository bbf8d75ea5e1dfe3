// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Produces the MNIST (train, test) splits.
//
// Two sources implement the DatasetSource trait:
//
//   BurnMnistSource → burn's vision dataset. Downloads the
//                     files once into burn's cache directory
//                     and reads them from there afterwards.
//
//   IdxDirSource    → the four raw IDX files already sitting
//                     in a local directory (offline machines).
//
// IDX file layout (all integers big-endian):
//
//   images: [magic=2051][count][rows][cols][count*rows*cols bytes]
//   labels: [magic=2049][count][count bytes]
//
// A dataset that cannot be fetched or parsed is fatal —
// there is no retry logic.
//
// Also home to the ground-truth loader used by inference.
//
// Reference: burn-dataset vision::mnist
//            Rust Book §9 (Error Handling)

use anyhow::{bail, ensure, Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::data::dataset::{vision::MnistDataset, Dataset};

use crate::domain::{
    ground_truth::GroundTruth,
    image::{Image, Label, HEIGHT, PIXELS, WIDTH},
    split::DatasetSplit,
    traits::DatasetSource,
};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES:  &str = "t10k-images-idx3-ubyte";
const TEST_LABELS:  &str = "t10k-labels-idx1-ubyte";

// ─── BurnMnistSource ──────────────────────────────────────────────────────────
/// MNIST through burn's dataset downloader.
pub struct BurnMnistSource {
    /// Keep at most this many samples per split
    limit: Option<usize>,
}

impl BurnMnistSource {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    fn convert(&self, dataset: &MnistDataset) -> Result<DatasetSplit> {
        let count = self.limit.map_or(dataset.len(), |l| l.min(dataset.len()));

        let mut images = Vec::with_capacity(count);
        let mut labels = Vec::with_capacity(count);

        for item in (0..count).filter_map(|i| dataset.get(i)) {
            // burn stores the raw bytes as f32 in 0..=255
            let pixels = item
                .image
                .iter()
                .flat_map(|row| row.iter().map(|&v| v as u8))
                .collect();
            images.push(Image::new(pixels)?);
            labels.push(Label::new(item.label)?);
        }

        DatasetSplit::new(images, labels)
    }
}

impl DatasetSource for BurnMnistSource {
    fn load(&self) -> Result<(DatasetSplit, DatasetSplit)> {
        tracing::info!("Fetching MNIST through burn's dataset cache");
        let train = self.convert(&MnistDataset::train())?;
        let test  = self.convert(&MnistDataset::test())?;

        tracing::info!("Loaded {} train / {} test images", train.len(), test.len());
        Ok((train, test))
    }
}

// ─── IdxDirSource ─────────────────────────────────────────────────────────────
/// MNIST from raw (uncompressed) IDX files in a directory.
pub struct IdxDirSource {
    dir:   PathBuf,
    limit: Option<usize>,
}

impl IdxDirSource {
    pub fn new(dir: impl Into<PathBuf>, limit: Option<usize>) -> Self {
        Self { dir: dir.into(), limit }
    }

    fn load_split(&self, images_file: &str, labels_file: &str) -> Result<DatasetSplit> {
        let images = parse_idx_images(&read_file(&self.dir.join(images_file))?)
            .with_context(|| format!("Malformed IDX image file '{images_file}'"))?;
        let labels = parse_idx_labels(&read_file(&self.dir.join(labels_file))?)
            .with_context(|| format!("Malformed IDX label file '{labels_file}'"))?;

        let mut split = DatasetSplit::new(images, labels)
            .with_context(|| format!("'{images_file}' and '{labels_file}' disagree"))?;
        if let Some(limit) = self.limit {
            split.truncate(limit);
        }
        Ok(split)
    }
}

impl DatasetSource for IdxDirSource {
    fn load(&self) -> Result<(DatasetSplit, DatasetSplit)> {
        tracing::info!("Reading MNIST IDX files from '{}'", self.dir.display());
        let train = self.load_split(TRAIN_IMAGES, TRAIN_LABELS)?;
        let test  = self.load_split(TEST_IMAGES, TEST_LABELS)?;

        tracing::info!("Loaded {} train / {} test images", train.len(), test.len());
        Ok((train, test))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Cannot read '{}'", path.display()))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let Some(word) = bytes.get(offset..offset + 4) else {
        bail!("truncated header: need {} bytes, have {}", offset + 4, bytes.len());
    };
    Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
}

/// Parse an IDX3 image file into 28x28 images.
pub fn parse_idx_images(bytes: &[u8]) -> Result<Vec<Image>> {
    let magic = read_u32(bytes, 0)?;
    ensure!(magic == IMAGES_MAGIC, "bad magic number {magic}, expected {IMAGES_MAGIC}");

    let count = read_u32(bytes, 4)? as usize;
    let rows  = read_u32(bytes, 8)? as usize;
    let cols  = read_u32(bytes, 12)? as usize;
    ensure!(
        rows == HEIGHT && cols == WIDTH,
        "images are {rows}x{cols}, expected {HEIGHT}x{WIDTH}"
    );

    let payload = &bytes[16..];
    ensure!(
        payload.len() == count * PIXELS,
        "header announces {count} images but payload has {} bytes",
        payload.len()
    );

    payload
        .chunks(PIXELS)
        .map(|chunk| Image::new(chunk.to_vec()))
        .collect()
}

/// Parse an IDX1 label file.
pub fn parse_idx_labels(bytes: &[u8]) -> Result<Vec<Label>> {
    let magic = read_u32(bytes, 0)?;
    ensure!(magic == LABELS_MAGIC, "bad magic number {magic}, expected {LABELS_MAGIC}");

    let count   = read_u32(bytes, 4)? as usize;
    let payload = &bytes[8..];
    ensure!(
        payload.len() == count,
        "header announces {count} labels but payload has {} bytes",
        payload.len()
    );

    payload.iter().map(|&b| Label::new(b)).collect()
}

// ─── Ground truth ─────────────────────────────────────────────────────────────
/// Read a `{"<file name>": <digit>}` JSON object.
pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read ground truth '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid ground truth in '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn idx_images(count: usize, fill: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        for word in [IMAGES_MAGIC, count as u32, HEIGHT as u32, WIDTH as u32] {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes.extend(std::iter::repeat(fill).take(count * PIXELS));
        bytes
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        bytes
    }

    #[test]
    fn test_parse_images() {
        let images = parse_idx_images(&idx_images(3, 200)).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[2].get(27, 27), 200);
    }

    #[test]
    fn test_parse_images_rejects_wrong_magic() {
        let mut bytes = idx_images(1, 0);
        bytes[3] = 0x01;
        assert!(parse_idx_images(&bytes).is_err());
    }

    #[test]
    fn test_parse_images_rejects_short_payload() {
        let mut bytes = idx_images(2, 0);
        bytes.pop();
        assert!(parse_idx_images(&bytes).is_err());
    }

    #[test]
    fn test_parse_images_rejects_truncated_header() {
        assert!(parse_idx_images(&[0, 0, 8]).is_err());
    }

    #[test]
    fn test_parse_labels_rejects_invalid_digit() {
        assert!(parse_idx_labels(&idx_labels(&[1, 2, 3])).is_ok());
        assert!(parse_idx_labels(&idx_labels(&[1, 12])).is_err());
    }

    #[test]
    fn test_idx_dir_source_loads_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRAIN_IMAGES), idx_images(6, 10)).unwrap();
        fs::write(dir.path().join(TRAIN_LABELS), idx_labels(&[0, 1, 2, 3, 4, 5])).unwrap();
        fs::write(dir.path().join(TEST_IMAGES), idx_images(2, 20)).unwrap();
        fs::write(dir.path().join(TEST_LABELS), idx_labels(&[6, 7])).unwrap();

        let (train, test) = IdxDirSource::new(dir.path(), Some(4)).load().unwrap();
        assert_eq!(train.len(), 4);
        assert_eq!(test.len(), 2);
        assert_eq!(test.labels()[1].value(), 7);
    }

    #[test]
    fn test_idx_dir_source_count_mismatch_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRAIN_IMAGES), idx_images(3, 0)).unwrap();
        fs::write(dir.path().join(TRAIN_LABELS), idx_labels(&[0, 1])).unwrap();
        fs::write(dir.path().join(TEST_IMAGES), idx_images(1, 0)).unwrap();
        fs::write(dir.path().join(TEST_LABELS), idx_labels(&[0])).unwrap();

        assert!(IdxDirSource::new(dir.path(), None).load().is_err());
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = IdxDirSource::new(dir.path().join("nope"), None);
        assert!(source.load().is_err());
    }

    #[test]
    fn test_load_ground_truth_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        fs::write(&path, r#"{"0.jpg": 0, "1.jpg": 8}"#).unwrap();
        let gt = load_ground_truth(&path).unwrap();
        assert_eq!(gt.label_for("1.jpg").unwrap().value(), 8);
    }

    // Needs network access on first run; downloads ~11MB into burn's cache.
    #[test]
    #[ignore]
    fn test_burn_source_reference_sizes() {
        let (train, test) = BurnMnistSource::new(None).load().unwrap();
        assert_eq!(train.len(), 60_000);
        assert_eq!(test.len(), 10_000);
    }
}
