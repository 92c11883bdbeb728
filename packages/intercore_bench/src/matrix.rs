use crate::sample::ProbeSample;

/// A square result grid indexed by position in the measured core list.
///
/// Cells start empty and stay empty wherever no measurement was taken, the
/// diagonal included.
#[derive(Debug)]
pub(crate) struct ResultMatrix {
    size: usize,
    cells: Vec<Option<ProbeSample>>,
}

impl ResultMatrix {
    pub(crate) fn new(size: usize) -> Self {
        let cell_count = size
            .checked_mul(size)
            .expect("matrix dimensions overflow usize only far beyond any real core count");

        Self {
            size,
            cells: vec![None; cell_count],
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Stores one sample into both `[a][b]` and `[b][a]`.
    pub(crate) fn set_symmetric(&mut self, a: usize, b: usize, sample: ProbeSample) {
        self.set_directional(a, b, sample);
        self.set_directional(b, a, sample);
    }

    /// Stores one sample into `[from][to]` only.
    pub(crate) fn set_directional(&mut self, from: usize, to: usize, sample: ProbeSample) {
        let index = self.index_of(from, to);

        *self
            .cells
            .get_mut(index)
            .expect("index_of already range-checked both coordinates") = Some(sample);
    }

    pub(crate) fn get(&self, from: usize, to: usize) -> Option<ProbeSample> {
        let index = self.index_of(from, to);

        *self
            .cells
            .get(index)
            .expect("index_of already range-checked both coordinates")
    }

    fn index_of(&self, from: usize, to: usize) -> usize {
        assert!(
            from < self.size,
            "row {from} is outside a matrix of {} cores",
            self.size
        );
        assert!(
            to < self.size,
            "column {to} is outside a matrix of {} cores",
            self.size
        );

        from.checked_mul(self.size)
            .and_then(|row_start| row_start.checked_add(to))
            .expect("cell index cannot overflow once both coordinates are in range")
    }
}
