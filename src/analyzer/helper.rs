use crate::*;

use std::{
    collections::BTreeSet,
    fmt,
    io,
};

/// Content-based detection for formats that have no fixed signature.
///
/// The stream handed over is positioned at its start. Implementations may
/// seek and read freely.
pub trait HeuristicAnalyzer : Send + Sync {
    /// Returns the detected type indicator, or `None` if the stream does not
    /// look like this format.
    fn analyze(&self, file: &mut dyn DataFile)
        -> io::Result<Option<TypeIndicator>>;
}

impl<F> HeuristicAnalyzer for F
where F: Fn(&mut dyn DataFile) -> io::Result<Option<TypeIndicator>>
    + Send + Sync {
    fn analyze(&self, file: &mut dyn DataFile)
        -> io::Result<Option<TypeIndicator>> {
        self(file)
    }
}

/// Everything the analyzer knows about one format: which categories it is
/// in, and how to recognise it. A helper has a signature specification, a
/// heuristic, or both.
pub struct AnalyzerHelper {
    type_indicator: TypeIndicator,
    categories: BTreeSet<FormatCategory>,
    specification: Option<FormatSpecification>,
    heuristic: Option<Box<dyn HeuristicAnalyzer>>,
}

impl AnalyzerHelper {
    /// A helper found by signatures only. The type indicator and categories
    /// come from the specification.
    pub fn with_specification(specification: FormatSpecification)
        -> AnalyzerHelper {
        AnalyzerHelper {
            type_indicator: specification.type_indicator().clone(),
            categories: specification.categories().clone(),
            specification: Some(specification),
            heuristic: None,
        }
    }
    /// A helper found by content analysis only.
    pub fn with_heuristic(type_indicator: TypeIndicator,
                          categories: impl IntoIterator<Item=FormatCategory>,
                          heuristic: impl HeuristicAnalyzer + 'static)
        -> AnalyzerHelper {
        AnalyzerHelper {
            type_indicator,
            categories: categories.into_iter().collect(),
            specification: None,
            heuristic: Some(Box::new(heuristic)),
        }
    }
    /// Adds a heuristic to a helper, keeping whatever signatures it has.
    pub fn and_heuristic(mut self,
                         heuristic: impl HeuristicAnalyzer + 'static)
        -> AnalyzerHelper {
        self.heuristic = Some(Box::new(heuristic));
        self
    }
    pub fn type_indicator(&self) -> &TypeIndicator { &self.type_indicator }
    pub fn categories(&self) -> &BTreeSet<FormatCategory> { &self.categories }
    pub fn in_category(&self, category: FormatCategory) -> bool {
        self.categories.contains(&category)
    }
    /// The signature specification, if this helper has one with at least
    /// one signature.
    pub fn specification(&self) -> Option<&FormatSpecification> {
        self.specification.as_ref()
            .filter(|x| x.is_signature_detectable())
    }
    pub fn has_heuristic(&self) -> bool { self.heuristic.is_some() }
    /// Runs the heuristic, if any.
    pub fn analyze(&self, file: &mut dyn DataFile)
        -> io::Result<Option<TypeIndicator>> {
        match &self.heuristic {
            Some(heuristic) => heuristic.analyze(file),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for AnalyzerHelper {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("AnalyzerHelper")
            .field("type_indicator", &self.type_indicator)
            .field("categories", &self.categories)
            .field("signatures", &self.specification.as_ref()
                   .map(|x| x.signatures().len()).unwrap_or(0))
            .field("heuristic", &self.heuristic.is_some())
            .finish()
    }
}
