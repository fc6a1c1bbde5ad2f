use crate::core::mark::MarkType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("mark type {0} is not part of the schema")]
    UnknownMark(MarkType),
}

/// Mark vocabulary of the rendering schema. The listed order is the
/// canonical order marks appear in on a text run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MarkType>", into = "Vec<MarkType>")]
pub struct Schema {
    marks: Vec<MarkType>,
}

impl Schema {
    pub fn new(marks: Vec<MarkType>) -> Self {
        let mut seen = BTreeSet::new();
        let marks = marks
            .into_iter()
            .filter(|mark| seen.insert(mark.clone()))
            .collect();
        Self { marks }
    }

    pub fn marks(&self) -> &[MarkType] {
        &self.marks
    }

    pub fn contains(&self, mark: &MarkType) -> bool {
        self.marks.contains(mark)
    }

    pub fn rank(&self, mark: &MarkType) -> Result<usize, SchemaError> {
        self.marks
            .iter()
            .position(|known| known == mark)
            .ok_or_else(|| SchemaError::UnknownMark(mark.clone()))
    }

    /// Sorts `marks` into canonical order, failing on the first unknown one.
    pub fn order<'a>(
        &self,
        marks: impl IntoIterator<Item = &'a MarkType>,
    ) -> Result<Vec<MarkType>, SchemaError> {
        let mut ranked = marks
            .into_iter()
            .map(|mark| Ok((self.rank(mark)?, mark.clone())))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        ranked.sort_by_key(|(rank, _)| *rank);
        Ok(ranked.into_iter().map(|(_, mark)| mark).collect())
    }
}

impl From<Vec<MarkType>> for Schema {
    fn from(marks: Vec<MarkType>) -> Self {
        Self::new(marks)
    }
}

impl From<Schema> for Vec<MarkType> {
    fn from(schema: Schema) -> Self {
        schema.marks
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(vec![MarkType::strong(), MarkType::em()])
    }
}
