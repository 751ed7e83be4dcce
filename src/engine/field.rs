// Per-field semantics. Every raw field is tagged gauge or counter, and every output
// metric is a scaled sum of derived field values, so it stays additive across rollups.

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Instantaneous value; averaged within a window.
    Gauge,
    /// Non-decreasing while the entity lives; turned into a per-second rate.
    Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Gauge,
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Counter,
        }
    }
}

/// An output metric: `scale * sum(derived value of each source field)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSpec {
    pub name: &'static str,
    pub sources: &'static [&'static str],
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedOutput {
    name: &'static str,
    sources: Vec<usize>,
    scale: f64,
}

/// Raw fields plus the outputs computed from them, with source names resolved to indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet {
    fields: &'static [FieldSpec],
    outputs: Vec<ResolvedOutput>,
}

impl MetricSet {
    pub fn new(
        fields: &'static [FieldSpec],
        outputs: &'static [OutputSpec],
    ) -> Result<Self, EngineError> {
        let mut resolved = Vec::with_capacity(outputs.len());
        for out in outputs {
            let mut sources = Vec::with_capacity(out.sources.len());
            for name in out.sources {
                let idx = fields.iter().position(|f| f.name == *name).ok_or_else(|| {
                    EngineError::UnknownField {
                        output: out.name,
                        field: name,
                    }
                })?;
                sources.push(idx);
            }
            resolved.push(ResolvedOutput {
                name: out.name,
                sources,
                scale: out.scale,
            });
        }
        Ok(Self {
            fields,
            outputs: resolved,
        })
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn output_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.outputs.iter().map(|o| o.name)
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Applies every output to one entity's derived field values.
    pub(crate) fn evaluate(&self, derived: &[f64]) -> Vec<f64> {
        self.outputs
            .iter()
            .map(|o| o.scale * o.sources.iter().map(|&i| derived[i]).sum::<f64>())
            .collect()
    }
}
