use ndarray::Array1;
use num_traits::{Float, FromPrimitive};

/// Population variance (ddof = 0). `None` for an empty series.
pub fn variance<F, I>(values: I) -> Option<F>
where
    F: Float + FromPrimitive,
    I: IntoIterator<Item = F>,
{
    let arr: Array1<F> = values.into_iter().collect();

    if arr.is_empty() {
        return None;
    }

    Some(arr.var(F::zero()))
}
