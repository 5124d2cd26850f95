use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix3};

/// Select the restart candidate with the maximum acquisition value.
///
/// Restarts with a non-finite value are excluded from the pool (a restart that
/// diverged must not win nor abort its siblings). On exact ties the first
/// candidate in index order wins. Returns `None` when no restart is left.
pub fn find_best_candidate(
    batch: &ArrayBase<impl Data<Elem = f64>, Ix3>,
    values: &Array1<f64>,
) -> Option<(Array2<f64>, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, v)| (batch.index_axis(Axis(0), i).to_owned(), v))
}
