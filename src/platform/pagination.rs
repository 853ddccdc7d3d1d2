//! Cursor pagination as a lazy stream.

use crate::error::{GatewayError, Result};
use crate::model::Page;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::future::Future;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turn a page fetcher into a stream of items.
///
/// Pages are requested only as the stream is polled. The stream ends after a
/// page with no next cursor or no data, and fails if the remote hands back a
/// cursor it already gave (which would otherwise loop forever). Calling
/// `paginate` again always starts from the first page.
pub fn paginate<T, F, Fut>(fetch: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    stream::try_unfold(
        (fetch, Cursor::Start, HashSet::new()),
        |(mut fetch, cursor, mut seen)| async move {
            let after = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::Next(c) => Some(c),
            };

            let page = fetch(after).await?;
            let next = match page.next_cursor {
                Some(c) if !page.data.is_empty() => {
                    if !seen.insert(c.clone()) {
                        return Err(GatewayError::upstream(format!(
                            "platform repeated pagination cursor '{}'",
                            c
                        )));
                    }
                    Cursor::Next(c)
                }
                _ => Cursor::Done,
            };

            let items = stream::iter(page.data.into_iter().map(Ok::<T, GatewayError>));
            Ok(Some((items, (fetch, next, seen))))
        },
    )
    .try_flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn numbered_pages(
        pages: Vec<Vec<u32>>,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut(Option<String>) -> futures::future::Ready<Result<Page<u32>>> {
        move |cursor| {
            calls.fetch_add(1, Ordering::SeqCst);
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let next_cursor = if index + 1 < pages.len() {
                Some((index + 1).to_string())
            } else {
                None
            };
            futures::future::ready(Ok(Page {
                data: pages[index].clone(),
                next_cursor,
            }))
        }
    }

    #[tokio::test]
    async fn test_walks_every_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = paginate(numbered_pages(
            vec![vec![1, 2], vec![3, 4], vec![5]],
            calls.clone(),
        ))
        .try_collect()
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = paginate(numbered_pages(vec![vec![1, 2], vec![3]], calls.clone()));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_upstream_error() {
        let fetch = |_cursor: Option<String>| {
            futures::future::ready(Ok(Page {
                data: vec![1u32],
                next_cursor: Some("same".to_string()),
            }))
        };
        let result: Result<Vec<u32>> = paginate(fetch).try_collect().await;
        assert!(matches!(result, Err(GatewayError::Upstream { .. })));
    }

    #[tokio::test]
    async fn test_fetch_error_ends_stream() {
        let fetch = |_cursor: Option<String>| {
            futures::future::ready(Err::<Page<u32>, _>(GatewayError::upstream("down")))
        };
        let mut stream = paginate(fetch);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
