//! Aggregate statistics over a collection of posts.
//!
//! Pure folds over an immutable slice: no shared state, no mutation of
//! the input, safe to call concurrently. Posts without an author group
//! under the empty string.

use serde::Serialize;
use std::collections::HashMap;

use crate::db::models::Post;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorLikes {
    pub author: String,
    pub total_likes: i64,
}

/// Sum of likes across all posts. Zero for an empty slice - the
/// identity element is a meaningful answer here, unlike the other
/// aggregates.
pub fn total_likes(posts: &[Post]) -> i64 {
    posts.iter().map(|p| p.likes).sum()
}

/// The post with the strictly greatest like count. Ties go to the
/// first occurrence in input order.
pub fn favorite_blog(posts: &[Post]) -> Option<&Post> {
    posts
        .iter()
        .fold(None, |best: Option<&Post>, post| match best {
            Some(b) if post.likes > b.likes => Some(post),
            Some(b) => Some(b),
            None => Some(post),
        })
}

/// The author with the most posts. Ties go to the first author
/// encountered (in input order) whose count reaches the maximum.
pub fn most_blogs(posts: &[Post]) -> Option<AuthorCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for post in posts {
        *counts.entry(author_of(post)).or_default() += 1;
    }

    best_by_first_seen(posts, &counts).map(|(author, count)| AuthorCount {
        author: author.to_string(),
        count,
    })
}

/// The author whose posts gather the greatest like total. Same
/// tie-break as `most_blogs`.
pub fn most_likes(posts: &[Post]) -> Option<AuthorLikes> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for post in posts {
        *totals.entry(author_of(post)).or_default() += post.likes;
    }

    best_by_first_seen(posts, &totals).map(|(author, total_likes)| AuthorLikes {
        author: author.to_string(),
        total_likes,
    })
}

fn author_of(post: &Post) -> &str {
    post.author.as_deref().unwrap_or("")
}

/// Scan posts in input order and pick the first author whose
/// aggregate is strictly greater than everything seen before.
fn best_by_first_seen<'a, T: Copy + PartialOrd>(
    posts: &'a [Post],
    aggregates: &HashMap<&'a str, T>,
) -> Option<(&'a str, T)> {
    let mut best: Option<(&'a str, T)> = None;
    for post in posts {
        let author = author_of(post);
        let value = aggregates[author];
        let beats = match best {
            Some((_, current)) => value > current,
            None => true,
        };
        if beats {
            best = Some((author, value));
        }
    }
    best
}
