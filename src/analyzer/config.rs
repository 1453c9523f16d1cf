use crate::*;

/// One tie-break rule: when several members of `family` match a stream in
/// `category` and `preferred` is among them, report only `preferred`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
pub struct BackEndPreference {
    pub category: FormatCategory,
    pub family: Vec<TypeIndicator>,
    pub preferred: TypeIndicator,
}

impl BackEndPreference {
    pub fn new(category: FormatCategory,
               family: impl IntoIterator<Item=TypeIndicator>,
               preferred: TypeIndicator) -> BackEndPreference {
        BackEndPreference {
            category,
            family: family.into_iter().collect(),
            preferred,
        }
    }
    fn applies(&self, category: FormatCategory, matched: &[TypeIndicator])
        -> bool {
        category == self.category && matched.len() > 1
            && matched.contains(&self.preferred)
            && matched.iter().all(|x| *x == self.preferred
                                  || self.family.contains(x))
    }
}

/// Analyzer tunables. Currently that is the tie-break table.
///
/// With the `config` feature this can be read from TOML:
///
/// ```toml
/// [[preferences]]
/// category = "file_system"
/// family = ["NTFS", "TSK"]
/// preferred = "NTFS"
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AnalyzerConfig {
    /// Checked in order; the first rule that applies wins.
    pub preferences: Vec<BackEndPreference>,
}

impl Default for AnalyzerConfig {
    /// Native drivers win over the Sleuthkit ones, GPT over the generic
    /// partition table.
    fn default() -> AnalyzerConfig {
        let tsk = |preferred: TypeIndicator| BackEndPreference::new(
            FormatCategory::FileSystem,
            [preferred.clone(), TypeIndicator::TSK],
            preferred,
        );
        AnalyzerConfig {
            preferences: vec![
                tsk(TypeIndicator::NTFS),
                tsk(TypeIndicator::EXT),
                tsk(TypeIndicator::HFS),
                tsk(TypeIndicator::FAT),
                BackEndPreference::new(
                    FormatCategory::VolumeSystem,
                    [TypeIndicator::GPT, TypeIndicator::TSK_PARTITION],
                    TypeIndicator::GPT,
                ),
            ],
        }
    }
}

impl AnalyzerConfig {
    /// No tie-breaking at all: every match is reported.
    pub fn without_preferences() -> AnalyzerConfig {
        AnalyzerConfig { preferences: vec![] }
    }
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<AnalyzerConfig> {
        toml::from_str(s).map_err(|x| Error::InvalidArgument(format!(
            "bad analyzer configuration: {}", x)))
    }
    /// Applies the first matching tie-break rule to `matched`.
    pub fn collapse(&self, category: FormatCategory,
                    matched: Vec<TypeIndicator>) -> Vec<TypeIndicator> {
        for preference in self.preferences.iter() {
            if preference.applies(category, &matched) {
                log::debug!("{} preferred over {:?}", preference.preferred,
                            matched);
                return vec![preference.preferred.clone()]
            }
        }
        matched
    }
}
