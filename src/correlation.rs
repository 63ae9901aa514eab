//! Variable-by-variable correlation matrices with a non-fatal placeholder
//! path and display masking.

use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("need at least two numeric columns, found {found}")]
    TooFewColumns { found: usize },
    #[error("column '{name}' has {len} rows, expected {expected}")]
    RaggedColumns {
        name: String,
        len: usize,
        expected: usize,
    },
    #[error("columns '{left}' and '{right}' share only {count} complete observations")]
    InsufficientObservations {
        left: String,
        right: String,
        count: usize,
    },
    #[error("column '{name}' has zero variance, correlation is undefined")]
    ZeroVariance { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub const ALL: [CorrelationMethod; 3] = [
        CorrelationMethod::Pearson,
        CorrelationMethod::Spearman,
        CorrelationMethod::Kendall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        }
    }

    /// Capitalized name for panel titles.
    pub fn title(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "Pearson",
            CorrelationMethod::Spearman => "Spearman",
            CorrelationMethod::Kendall => "Kendall",
        }
    }
}

impl FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            other => Err(format!(
                "unknown correlation method '{}', expected pearson, spearman or kendall",
                other
            )),
        }
    }
}

impl TryFrom<String> for CorrelationMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of named numeric columns. `NaN` marks a missing observation.
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values);
        }
        table
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.names.push(name.into());
        self.columns.push(values);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, idx: usize) -> Option<&[f64]> {
        self.columns.get(idx).map(Vec::as_slice)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Restrict the table to `targets`, in that order. Unknown names are
    /// skipped.
    pub fn select<S: AsRef<str>>(&self, targets: &[S]) -> Self {
        let mut selected = Self::new();
        for target in targets {
            let target = target.as_ref();
            match self.names.iter().position(|n| n == target) {
                Some(idx) => selected.push_column(target, self.columns[idx].clone()),
                None => tracing::warn!(column = target, "selected column not present in table"),
            }
        }
        selected
    }
}

/// Square symmetric matrix with unit diagonal, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    fn identity(names: Vec<String>) -> Self {
        let n = names.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self { names, values }
    }

    fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        let n = self.size();
        self.values[i * n + j] = value;
        self.values[j * n + i] = value;
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size() + j]
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        let n = self.size();
        if n == 0 {
            return Vec::new();
        }
        self.values.chunks(n).map(<[f64]>::to_vec).collect()
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.size();
        (0..n).all(|i| (0..n).all(|j| self.get(i, j) == self.get(j, i)))
    }

    pub fn masked(&self, mask: MaskOptions) -> MaskedView<'_> {
        MaskedView { matrix: self, mask }
    }
}

/// Which redundant entries to hide when displaying a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskOptions {
    /// Hide entries strictly above the diagonal.
    pub mask_upper: bool,
    pub show_diagonal: bool,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            mask_upper: true,
            show_diagonal: true,
        }
    }
}

impl MaskOptions {
    pub const NONE: MaskOptions = MaskOptions {
        mask_upper: false,
        show_diagonal: true,
    };

    pub fn hides(&self, i: usize, j: usize) -> bool {
        (self.mask_upper && j > i) || (!self.show_diagonal && i == j)
    }
}

/// Display-only view of a matrix with some cells hidden.
#[derive(Debug, Clone, Copy)]
pub struct MaskedView<'a> {
    matrix: &'a CorrelationMatrix,
    mask: MaskOptions,
}

impl MaskedView<'_> {
    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    pub fn names(&self) -> &[String] {
        self.matrix.names()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if self.mask.hides(i, j) {
            None
        } else {
            Some(self.matrix.get(i, j))
        }
    }

    /// Visible cells as `(row, col, value)`.
    pub fn visible_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.size();
        (0..n).flat_map(move |i| (0..n).filter_map(move |j| self.get(i, j).map(|v| (i, j, v))))
    }
}

/// Result of a correlation request.
///
/// `Fallback` carries a placeholder matrix suitable only for degraded
/// display; its values carry no statistical meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationOutcome {
    Computed(CorrelationMatrix),
    Fallback {
        matrix: CorrelationMatrix,
        reason: CorrelationError,
    },
}

impl CorrelationOutcome {
    pub fn matrix(&self) -> &CorrelationMatrix {
        match self {
            CorrelationOutcome::Computed(matrix) => matrix,
            CorrelationOutcome::Fallback { matrix, .. } => matrix,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, CorrelationOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&CorrelationError> {
        match self {
            CorrelationOutcome::Computed(_) => None,
            CorrelationOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Compute the full correlation matrix, failing on degenerate input.
///
/// Observations are taken pairwise: a row counts for a pair of columns when
/// both values are finite. A pair with fewer than two complete rows or with
/// a constant column is undefined and fails the whole computation.
pub fn compute(
    table: &MetricTable,
    method: CorrelationMethod,
) -> Result<CorrelationMatrix, CorrelationError> {
    let n = table.num_columns();
    if n < 2 {
        return Err(CorrelationError::TooFewColumns { found: n });
    }
    let expected = table.num_rows();
    for (name, column) in table.names.iter().zip(&table.columns) {
        if column.len() != expected {
            return Err(CorrelationError::RaggedColumns {
                name: name.clone(),
                len: column.len(),
                expected,
            });
        }
    }

    let mut matrix = CorrelationMatrix::identity(table.names.clone());
    for i in 0..n {
        for j in (i + 1)..n {
            let (xs, ys): (Vec<f64>, Vec<f64>) = table.columns[i]
                .iter()
                .zip(&table.columns[j])
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .map(|(x, y)| (*x, *y))
                .unzip();

            if xs.len() < 2 {
                return Err(CorrelationError::InsufficientObservations {
                    left: table.names[i].clone(),
                    right: table.names[j].clone(),
                    count: xs.len(),
                });
            }

            let coefficient = match method {
                CorrelationMethod::Pearson => pearson(&xs, &ys),
                CorrelationMethod::Spearman => spearman(&xs, &ys),
                CorrelationMethod::Kendall => kendall_tau_b(&xs, &ys),
            };
            let coefficient = coefficient.map_err(|side| CorrelationError::ZeroVariance {
                name: match side {
                    Side::Left => table.names[i].clone(),
                    Side::Right => table.names[j].clone(),
                },
            })?;
            matrix.set_pair(i, j, coefficient.clamp(-1.0, 1.0));
        }
    }
    Ok(matrix)
}

/// Compute a correlation matrix, substituting a placeholder when the
/// computation fails. Never fails.
pub fn correlate(table: &MetricTable, method: CorrelationMethod) -> CorrelationOutcome {
    correlate_with_rng(table, method, &mut rand::thread_rng())
}

pub fn correlate_with_rng<R: Rng + ?Sized>(
    table: &MetricTable,
    method: CorrelationMethod,
    rng: &mut R,
) -> CorrelationOutcome {
    match compute(table, method) {
        Ok(matrix) => CorrelationOutcome::Computed(matrix),
        Err(reason) => {
            tracing::warn!(%method, %reason, "correlation failed, using placeholder matrix");
            CorrelationOutcome::Fallback {
                matrix: placeholder_matrix(table.names().to_vec(), rng),
                reason,
            }
        }
    }
}

/// Uniformly random symmetric matrix with unit diagonal.
pub fn placeholder_matrix<R: Rng + ?Sized>(names: Vec<String>, rng: &mut R) -> CorrelationMatrix {
    let n = names.len();
    let mut matrix = CorrelationMatrix::identity(names);
    for i in 0..n {
        for j in (i + 1)..n {
            let value = rng.gen_range(-1.0..=1.0);
            matrix.set_pair(i, j, value);
        }
    }
    matrix
}

/// Which input of a pair is constant.
enum Side {
    Left,
    Right,
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64, Side> {
    // the mean of a constant column can round away from its value
    if is_constant(xs) {
        return Err(Side::Left);
    }
    if is_constant(ys) {
        return Err(Side::Right);
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= 0.0 {
        return Err(Side::Left);
    }
    if syy <= 0.0 {
        return Err(Side::Right);
    }
    Ok(sxy / (sxx.sqrt() * syy.sqrt()))
}

fn spearman(xs: &[f64], ys: &[f64]) -> Result<f64, Side> {
    let rx = crate::stats::average_ranks(xs);
    let ry = crate::stats::average_ranks(ys);
    pearson(&rx, &ry)
}

/// Kendall's tau-b, corrected for ties on either side.
fn kendall_tau_b(xs: &[f64], ys: &[f64]) -> Result<f64, Side> {
    let n = xs.len();
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut ties_x = 0i64;
    let mut ties_y = 0i64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = xs[i] - xs[j];
            let dy = ys[i] - ys[j];
            if dx == 0.0 {
                ties_x += 1;
            }
            if dy == 0.0 {
                ties_y += 1;
            }
            if dx == 0.0 || dy == 0.0 {
                continue;
            }
            if (dx > 0.0) == (dy > 0.0) {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    let total = (n * (n - 1) / 2) as i64;
    if total - ties_x == 0 {
        return Err(Side::Left);
    }
    if total - ties_y == 0 {
        return Err(Side::Right);
    }
    let denom = (((total - ties_x) as f64) * ((total - ties_y) as f64)).sqrt();
    Ok((concordant - discordant) as f64 / denom)
}
