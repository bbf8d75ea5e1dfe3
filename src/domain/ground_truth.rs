// ============================================================
// Layer 3 — Ground Truth Mapping
// ============================================================
// The expected digit for each external inference image,
// keyed by file name.
//
// The expected class is supplied explicitly rather than
// guessed from the file name: a file called "3.jpg" is not
// guaranteed to contain a 3. The old naming convention is
// still available, but only when asked for by name
// (`GroundTruth::from_file_indices`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::image::Label;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruth {
    labels: BTreeMap<String, Label>,
}

impl GroundTruth {
    /// Treat `<i>.<extension>` as showing digit `i % 10`.
    pub fn from_file_indices(count: usize, extension: &str) -> Self {
        let labels = (0..count)
            .filter_map(|i| {
                let label = Label::new((i % 10) as u8).ok()?;
                Some((format!("{i}.{extension}"), label))
            })
            .collect();
        Self { labels }
    }

    /// Expected label for a file name, if one was supplied
    pub fn label_for(&self, file_name: &str) -> Option<Label> {
        self.labels.get(file_name).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
impl GroundTruth {
    pub fn new(labels: BTreeMap<String, Label>) -> Self {
        Self { labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_json_object() {
        let gt: GroundTruth = serde_json::from_str(r#"{"0.jpg": 4, "1.jpg": 1}"#).unwrap();
        assert_eq!(gt.len(), 2);
        assert_eq!(gt.label_for("0.jpg").unwrap().value(), 4);
        assert!(gt.label_for("2.jpg").is_none());
    }

    #[test]
    fn test_rejects_invalid_digit() {
        assert!(serde_json::from_str::<GroundTruth>(r#"{"0.jpg": 11}"#).is_err());
    }

    #[test]
    fn test_from_file_indices() {
        let gt = GroundTruth::from_file_indices(10, "jpg");
        assert_eq!(gt.len(), 10);
        assert_eq!(gt.label_for("7.jpg").unwrap().value(), 7);
    }
}
