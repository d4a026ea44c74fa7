//! Joins posts with their author and engagement counts.

use crate::database::models::{PostRecord, UserRecord};
use crate::database::repositories::{CommentRepository, LikeRepository, UserRepository};
use crate::error::{FeedError, FeedResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A post as the feed endpoints return it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    pub post: PostRecord,
    pub author: UserRecord,
    pub like_count: i64,
    pub comment_count: i64,
}

/// Builds aggregate views with one author lookup and one grouped count per
/// engagement kind, however many posts are passed in.
///
/// Output is ascending by post id. A post whose author is missing fails the
/// whole call; no partial list is returned.
pub fn assemble<U, L, C>(
    users: &U,
    likes: &L,
    comments: &C,
    mut posts: Vec<PostRecord>,
) -> FeedResult<Vec<AggregateView>>
where
    U: UserRepository + ?Sized,
    L: LikeRepository + ?Sized,
    C: CommentRepository + ?Sized,
{
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    posts.sort_by_key(|post| post.id);

    let mut author_ids: Vec<i64> = posts.iter().map(|post| post.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let authors: HashMap<i64, UserRecord> = users
        .get_many(&author_ids)?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let like_counts = likes.count_for_posts(&post_ids)?;
    let comment_counts = comments.count_for_posts(&post_ids)?;

    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let Some(author) = authors.get(&post.author_id) else {
            tracing::error!(
                post_id = post.id,
                author_id = post.author_id,
                "post references a missing author"
            );
            return Err(FeedError::DataIntegrity(format!(
                "post {} references missing author {}",
                post.id, post.author_id
            )));
        };
        views.push(AggregateView {
            like_count: like_counts.get(&post.id).copied().unwrap_or(0),
            comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
            author: author.clone(),
            post,
        });
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewComment;
    use crate::database::repositories::tests::{new_post, new_user, setup_conn};
    use crate::database::repositories::{PostRepository, SqliteRepositories};

    #[test]
    fn views_are_sorted_and_counted() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = new_user(&repos, "alice");
        let bob = new_user(&repos, "bob");
        let first = new_post(&repos, alice, false);
        let second = new_post(&repos, bob, true);
        let third = new_post(&repos, alice, false);

        repos.likes().add(second, alice, "2016-11-05T12:00:00Z").unwrap();
        repos.likes().add(second, bob, "2016-11-05T12:00:00Z").unwrap();
        repos
            .comments()
            .create(&NewComment {
                post_id: third,
                user_id: bob,
                username: "bob".into(),
                text: "hi".into(),
                created_date: "2016-11-05".into(),
                created_time: "12:00:00".into(),
            })
            .unwrap();

        let posts = repos.posts();
        let input: Vec<PostRecord> = [third, first, second]
            .into_iter()
            .map(|id| posts.get(id).unwrap().unwrap())
            .collect();

        let views = assemble(&repos.users(), &repos.likes(), &repos.comments(), input).unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(
            views.iter().map(|v| v.post.id).collect::<Vec<_>>(),
            vec![first, second, third]
        );
        assert_eq!(views[0].author.username, "alice");
        assert_eq!(views[1].author.username, "bob");
        assert_eq!((views[0].like_count, views[0].comment_count), (0, 0));
        assert_eq!((views[1].like_count, views[1].comment_count), (2, 0));
        assert_eq!((views[2].like_count, views[2].comment_count), (0, 1));
    }

    #[test]
    fn missing_author_fails_the_whole_batch() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = new_user(&repos, "alice");
        let real = repos.posts().get(new_post(&repos, alice, false)).unwrap().unwrap();
        let orphan = PostRecord {
            id: real.id + 100,
            author_id: 9_999,
            ..real.clone()
        };

        let err = assemble(
            &repos.users(),
            &repos.likes(),
            &repos.comments(),
            vec![real, orphan],
        )
        .unwrap_err();
        assert!(matches!(err, FeedError::DataIntegrity(_)));
    }

    #[test]
    fn empty_input_needs_no_storage() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let views =
            assemble(&repos.users(), &repos.likes(), &repos.comments(), Vec::new()).unwrap();
        assert!(views.is_empty());
    }
}
