use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::geometry::BBox;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Figure,
    Table,
    Formula,
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Figure => "figure",
            ElementKind::Table => "table",
            ElementKind::Formula => "formula",
            ElementKind::Other => "other",
        }
    }
}

// Detectors emit an open set of class labels; anything unrecognized
// lands in Other instead of failing the page.
impl<'de> Deserialize<'de> for ElementKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(match label.as_str() {
            "text" => ElementKind::Text,
            "figure" => ElementKind::Figure,
            "table" => ElementKind::Table,
            "formula" => ElementKind::Formula,
            _ => ElementKind::Other,
        })
    }
}

/// One layout element as reported by the upstream detector. A missing
/// bbox means the detector produced malformed geometry; such elements
/// are carried along but never participate in spatial decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedElement {
    pub id: String,
    pub kind: ElementKind,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

fn default_confidence() -> f32 {
    0.5
}

impl DetectedElement {
    pub fn new(id: impl Into<String>, kind: ElementKind, bbox: BBox) -> Self {
        Self {
            id: id.into(),
            kind,
            confidence: default_confidence(),
            bbox: Some(bbox),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// An element move recommended by the reassignment engine. The engine
/// never applies moves itself; callers do, via `apply_moves`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementMove {
    pub element_id: String,
    pub from_question: u32,
    pub to_question: u32,
}

/// Mapping from question number to the elements currently assigned to
/// it, each sequence ordered top-to-bottom on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct QuestionAssignment {
    questions: BTreeMap<u32, Vec<DetectedElement>>,
}

impl QuestionAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: u32, element: DetectedElement) {
        self.questions.entry(question).or_default().push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn element_count(&self) -> usize {
        self.questions.values().map(Vec::len).sum()
    }

    pub fn question_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.questions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[DetectedElement])> {
        self.questions.iter().map(|(q, els)| (*q, els.as_slice()))
    }

    pub fn elements(&self, question: u32) -> Option<&[DetectedElement]> {
        self.questions.get(&question).map(Vec::as_slice)
    }

    /// The question currently holding the given element, if any.
    pub fn owner_of(&self, element_id: &str) -> Option<u32> {
        self.questions
            .iter()
            .find(|(_, els)| els.iter().any(|e| e.id == element_id))
            .map(|(q, _)| *q)
    }

    /// Flattens the assignment into element id → question number, the
    /// shape consumed by the accuracy evaluator.
    pub fn element_questions(&self) -> BTreeMap<String, u32> {
        self.questions
            .iter()
            .flat_map(|(q, els)| els.iter().map(|e| (e.id.clone(), *q)))
            .collect()
    }

    /// Re-sorts every question's elements top-to-bottom; boxless
    /// elements sink to the end of their sequence.
    pub fn sort_vertically(&mut self) {
        for elements in self.questions.values_mut() {
            elements.sort_by_key(|e| match e.bbox {
                Some(b) => (0, b.y1, b.x1),
                None => (1, 0, 0),
            });
        }
    }

    /// Applies engine-recommended moves. Each moved element is removed
    /// from its source question and inserted into the target, which is
    /// then re-sorted by vertical position.
    pub fn apply_moves(&mut self, moves: &[ElementMove]) {
        for mv in moves {
            let Some(source) = self.questions.get_mut(&mv.from_question) else {
                continue;
            };
            let Some(idx) = source.iter().position(|e| e.id == mv.element_id) else {
                continue;
            };
            let element = source.remove(idx);
            self.questions
                .entry(mv.to_question)
                .or_default()
                .push(element);
        }
        self.sort_vertically();
    }
}
