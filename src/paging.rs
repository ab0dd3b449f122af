//! Lazy pagination over linked result pages.
//!
//! [`paginate`] turns one logical query into a [`Stream`] of items. Pages are
//! fetched one at a time, only when the consumer has drained the previous
//! page, so dropping the stream stops all network activity.

use std::collections::{HashSet, VecDeque};

use futures::Stream;
use futures::stream;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::Request;
use crate::models::Page;
use crate::session::Session;

struct Pager<T, D> {
    session: Session,
    decode: D,
    pending: Option<Request>,
    buffer: VecDeque<T>,
    fetched: HashSet<String>,
    yielded: usize,
    limit: Option<usize>,
}

impl<T, D> Pager<T, D>
where
    D: Fn(&str) -> Result<Page<T>>,
{
    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.yielded >= limit)
    }

    async fn fetch(&mut self, request: Request) -> Result<()> {
        self.fetched.insert(request.url.clone());
        let response = self.session.execute(request).await?;
        let page = (self.decode)(&response.body)?;
        debug!(
            items = page.items.len(),
            has_next = page.next.is_some(),
            "fetched page"
        );
        self.pending = page.next.map(Request::get);
        self.buffer.extend(page.items);
        Ok(())
    }
}

/// Streams every item of a paginated query.
///
/// The initial request is sent on first poll. Each page's items are yielded
/// in server order, then the page's next link (if any) is fetched with a
/// GET. The stream ends after the last page or once `limit` items have been
/// yielded; a page past the limit is never requested. Each page URL is
/// fetched at most once: a next link pointing back at a page already
/// fetched by this stream ends it.
///
/// A failed exchange yields a single `Err` and ends the stream. Items
/// yielded before the failure stay yielded.
pub fn paginate<T, D>(
    session: Session,
    initial: Request,
    decode: D,
    limit: Option<usize>,
) -> impl Stream<Item = Result<T>> + Send + 'static
where
    T: Send + 'static,
    D: Fn(&str) -> Result<Page<T>> + Send + 'static,
{
    let pager = Pager {
        session,
        decode,
        pending: Some(initial),
        buffer: VecDeque::new(),
        fetched: HashSet::new(),
        yielded: 0,
        limit,
    };

    stream::unfold(pager, |mut pager| async move {
        loop {
            if pager.limit_reached() {
                return None;
            }
            if let Some(item) = pager.buffer.pop_front() {
                pager.yielded += 1;
                return Some((Ok(item), pager));
            }
            let request = pager.pending.take()?;
            if pager.fetched.contains(&request.url) {
                warn!(url = %request.url, "next link repeats an earlier page, stopping");
                return None;
            }
            if let Err(err) = pager.fetch(request).await {
                return Some((Err(err), pager));
            }
        }
    })
}
