//! Class label files: one `id,name` pair per line.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Mapping from class id to display name.
#[derive(Debug, Default)]
pub struct LabelMap {
    names: BTreeMap<u32, String>,
}

impl LabelMap {
    /// Parses label text. Lines without a comma or with a non-integer id
    /// (such as a header row) are skipped.
    pub fn parse(text: &str) -> Self {
        let names = text
            .lines()
            .filter_map(|line| {
                let (id, name) = line.split_once(',')?;
                let id = id.trim().parse::<u32>().ok()?;
                Some((id, name.trim().to_string()))
            })
            .collect();
        Self { names }
    }

    /// Reads and parses a label file.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Name of `id`, if known.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::LabelMap;

    #[test]
    fn skips_header_and_trims_names() {
        let labels = LabelMap::parse("id,name\n1, cereal box \n2,milk\nbogus\n");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.name(1), Some("cereal box"));
        assert_eq!(labels.name(2), Some("milk"));
        assert_eq!(labels.name(0), None);
    }
}
