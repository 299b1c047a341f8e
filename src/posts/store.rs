// Store traits - isolate all database side effects
use async_trait::async_trait;
use rusqlite::params;
use thiserror::Error;

use crate::db::models::{Post, PostId, PostListing, PostOwner, User, UserId};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    /// Persist changes to an existing user, including the owned-post list.
    async fn save(&self, user: &User) -> Result<(), StoreError>;

    async fn find_all(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError>;

    async fn insert(&self, post: &Post) -> Result<(), StoreError>;

    /// Replace a post's mutable fields. Returns `None` when no post
    /// with that id exists. The owner column is never touched.
    async fn update_by_id(&self, id: &PostId, post: &Post) -> Result<Option<Post>, StoreError>;

    /// Returns whether a row was actually removed.
    async fn delete_by_id(&self, id: &PostId) -> Result<bool, StoreError>;

    async fn find_all(&self) -> Result<Vec<Post>, StoreError>;

    /// All posts joined with the owning user's username and display name.
    async fn find_all_with_owners(&self) -> Result<Vec<PostListing>, StoreError>;
}

/// SQLite implementations
pub struct SqliteUserStore {
    pool: DbPool,
}

impl SqliteUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn user_from_parts(
    id: UserId,
    username: String,
    name: Option<String>,
    password_hash: String,
    post_ids_json: String,
) -> Result<User, StoreError> {
    let post_ids: Vec<PostId> = serde_json::from_str(&post_ids_json)?;
    Ok(User {
        id,
        username,
        name,
        password_hash,
        post_ids,
    })
}

type UserRow = (UserId, String, Option<String>, String, String);

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;

        let row: Result<UserRow, rusqlite::Error> = conn.query_row(
            "SELECT id, username, name, password_hash, post_ids FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        );

        match row {
            Ok((id, username, name, hash, post_ids)) => {
                Ok(Some(user_from_parts(id, username, name, hash, post_ids)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;

        let row: Result<UserRow, rusqlite::Error> = conn.query_row(
            "SELECT id, username, name, password_hash, post_ids FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        );

        match row {
            Ok((id, username, name, hash, post_ids)) => {
                Ok(Some(user_from_parts(id, username, name, hash, post_ids)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO users (id, username, name, password_hash, post_ids)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.username,
                user.name,
                user.password_hash,
                serde_json::to_string(&user.post_ids)?,
            ],
        )?;

        Ok(())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "UPDATE users SET username = ?2, name = ?3, password_hash = ?4, post_ids = ?5
             WHERE id = ?1",
            params![
                user.id,
                user.username,
                user.name,
                user.password_hash,
                serde_json::to_string(&user.post_ids)?,
            ],
        )?;

        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, username, name, password_hash, post_ids FROM users ORDER BY id",
        )?;
        let rows: Vec<UserRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, username, name, hash, post_ids)| {
                user_from_parts(id, username, name, hash, post_ids)
            })
            .collect()
    }
}

pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;

        let result = conn.query_row(
            "SELECT id, title, author, url, likes, user_id FROM posts WHERE id = ?1",
            params![id],
            |row| {
                Ok(Post {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    author: row.get(2)?,
                    url: row.get(3)?,
                    likes: row.get(4)?,
                    owner_id: row.get(5)?,
                })
            },
        );

        match result {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, post: &Post) -> Result<(), StoreError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO posts (id, user_id, title, author, url, likes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post.id,
                post.owner_id,
                post.title,
                post.author,
                post.url,
                post.likes,
            ],
        )?;

        Ok(())
    }

    async fn update_by_id(&self, id: &PostId, post: &Post) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE posts SET title = ?2, author = ?3, url = ?4, likes = ?5 WHERE id = ?1",
            params![id, post.title, post.author, post.url, post.likes],
        )?;

        Ok((rows > 0).then(|| post.clone()))
    }

    async fn delete_by_id(&self, id: &PostId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn find_all(&self) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt =
            conn.prepare("SELECT id, title, author, url, likes, user_id FROM posts ORDER BY id")?;
        let posts = stmt
            .query_map([], |row| {
                Ok(Post {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    author: row.get(2)?,
                    url: row.get(3)?,
                    likes: row.get(4)?,
                    owner_id: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn find_all_with_owners(&self) -> Result<Vec<PostListing>, StoreError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.author, p.url, p.likes, u.id, u.username, u.name
             FROM posts p JOIN users u ON u.id = p.user_id
             ORDER BY p.id",
        )?;
        let listings = stmt
            .query_map([], |row| {
                Ok(PostListing {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    author: row.get(2)?,
                    url: row.get(3)?,
                    likes: row.get(4)?,
                    user: PostOwner {
                        id: row.get(5)?,
                        username: row.get(6)?,
                        name: row.get(7)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }
}
