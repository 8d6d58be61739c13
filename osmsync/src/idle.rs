//! Sliced iteration that yields to the runtime between batches.
//!
//! Large documents are converted a few elements at a time so other tasks
//! (viewport updates, completions of other tiles) keep making progress.

use std::ops::ControlFlow;

/// Applies `per_item` to every item, yielding to the scheduler after each
/// slice of `batch_size` items.
///
/// `per_item` returns `ControlFlow::Break(err)` to stop early; items it maps
/// to `None` are dropped from the output.
pub async fn for_each_idle<I, T, R, E, F>(
    items: I,
    batch_size: usize,
    mut per_item: F,
) -> Result<Vec<R>, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> ControlFlow<E, Option<R>>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::new();

    for (i, item) in items.into_iter().enumerate() {
        if i > 0 && i % batch_size == 0 {
            tokio::task::yield_now().await;
        }
        match per_item(item) {
            ControlFlow::Continue(Some(result)) => results.push(result),
            ControlFlow::Continue(None) => {}
            ControlFlow::Break(err) => return Err(err),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_maps_and_filters_in_order() {
        let out: Result<Vec<i32>, ()> = for_each_idle(1..=10, 3, |n| {
            ControlFlow::Continue(if n % 2 == 0 { Some(n * 10) } else { None })
        })
        .await;
        assert_eq!(out.unwrap(), vec![20, 40, 60, 80, 100]);
    }

    #[tokio::test]
    async fn test_break_stops_iteration() {
        let mut visited = 0;
        let out: Result<Vec<i32>, &str> = for_each_idle(1..=10, 2, |n| {
            visited += 1;
            if n == 4 {
                ControlFlow::Break("stop")
            } else {
                ControlFlow::Continue(Some(n))
            }
        })
        .await;
        assert_eq!(out, Err("stop"));
        assert_eq!(visited, 4);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_treated_as_one() {
        let out: Result<Vec<u8>, ()> =
            for_each_idle(vec![1u8, 2, 3], 0, |n| ControlFlow::Continue(Some(n))).await;
        assert_eq!(out.unwrap(), vec![1, 2, 3]);
    }
}
