//! Home timeline: every followed author's posts merged into one id-ordered
//! stream.

use super::cursor::{sort_by_id, Cursor, Page};
use crate::database::models::PostRecord;
use crate::database::repositories::{FollowingRepository, IdBound, PostRepository, PostScope};
use crate::error::FeedResult;
use std::collections::BinaryHeap;

/// Merges streams that are each sorted in the requested order, yielding at
/// most `take` posts. Equal ids are emitted once.
pub fn merge_streams(
    streams: Vec<Vec<PostRecord>>,
    ascending: bool,
    take: usize,
) -> Vec<PostRecord> {
    // Max-heap keyed so the next post in merge order is always on top.
    let key = |id: i64| if ascending { -id } else { id };
    let total: usize = streams.iter().map(Vec::len).sum();

    let mut cursors: Vec<std::vec::IntoIter<PostRecord>> =
        streams.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<PostRecord>> = cursors.iter_mut().map(Iterator::next).collect();
    let mut heap = BinaryHeap::with_capacity(heads.len());
    for (stream, head) in heads.iter().enumerate() {
        if let Some(post) = head {
            heap.push((key(post.id), stream));
        }
    }

    let mut merged: Vec<PostRecord> = Vec::with_capacity(take.min(total));
    while merged.len() < take {
        let Some((_, stream)) = heap.pop() else {
            break;
        };
        let Some(post) = heads[stream].take() else {
            continue;
        };
        if let Some(next) = cursors[stream].next() {
            heap.push((key(next.id), stream));
            heads[stream] = Some(next);
        }
        if merged.last().map(|last| last.id) != Some(post.id) {
            merged.push(post);
        }
    }
    merged
}

/// One page of `user_id`'s timeline.
///
/// Each followee's stream is fetched with the cursor's bound and `limit + 1`
/// rows, which is enough for the merged page and its `has_more` flag.
pub fn resolve_timeline<F, P>(
    following: &F,
    posts: &P,
    user_id: i64,
    cursor: &Cursor,
    scope: PostScope,
) -> FeedResult<Page<PostRecord>>
where
    F: FollowingRepository + ?Sized,
    P: PostRepository + ?Sized,
{
    let followees = following.followees_of(user_id)?;
    if followees.is_empty() {
        return Ok(Page::empty());
    }

    let bound = cursor.bound();
    let overfetch = cursor.limit().saturating_add(1);
    let mut streams = Vec::with_capacity(followees.len());
    for author_id in &followees {
        let stream = posts.page_by_author(*author_id, bound, scope, overfetch)?;
        if !stream.is_empty() {
            streams.push(stream);
        }
    }

    // Storage order: ascending after an offset, newest first otherwise.
    let storage_ascending = matches!(bound, IdBound::After(_));
    let merged = merge_streams(streams, storage_ascending, overfetch as usize);
    let mut page = Page::from_overfetch(merged, cursor.limit());
    sort_by_id(&mut page.items, |post| post.id, cursor.ascending());

    tracing::debug!(
        user_id,
        followees = followees.len(),
        offset_id = cursor.offset_id(),
        returned = page.items.len(),
        has_more = page.has_more,
        "resolved timeline page"
    );
    Ok(page)
}

pub fn count_posts_in_timeline<P: PostRepository + ?Sized>(
    posts: &P,
    user_id: i64,
) -> FeedResult<i64> {
    Ok(posts.count_in_timeline(user_id)?)
}
